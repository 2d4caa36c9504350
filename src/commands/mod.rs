pub mod combine;
pub mod index;
pub mod merge;
pub mod records;
