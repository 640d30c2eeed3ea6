use fieldstaff::{
    array::{DataArray, Element, SharedArray},
    attributes::DataSetAttributes,
};

#[macro_export]
macro_rules! def_test {
    (
        ARRAYS[$($array_ident:ident = $array_expr:expr),*]
        fn $name:ident $test_body:expr
    ) => {
        #[test]
        fn $name() {
            $( let $array_ident = $array_expr; )*
            $test_body
        }
    };
}

pub fn shared<T: Element>(name: &str, num_components: usize, values: Vec<T>) -> SharedArray {
    SharedArray::new(DataArray::from_values(name, num_components, values))
}

pub fn attributes_with(arrays: &[&SharedArray]) -> DataSetAttributes {
    let mut attributes = DataSetAttributes::new();
    for &array in arrays {
        attributes.add_array(Some(array.clone()));
    }
    attributes
}

pub fn f64_values(array: &SharedArray) -> Vec<f64> {
    let array = array.read();
    (0..array.num_tuples())
        .flat_map(|tuple| {
            array
                .tuple(tuple)
                .unwrap_or_else(|| panic!("Tuple {} not numeric", tuple))
        })
        .collect()
}
