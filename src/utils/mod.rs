pub mod markup;
pub mod sort;
