pub(crate) mod compare;
pub(crate) mod logical;
pub(crate) mod select;
