pub(crate) mod cast;
pub(crate) mod reshape;
pub(crate) mod transpose;
