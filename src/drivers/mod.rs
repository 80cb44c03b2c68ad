pub mod lis3dh;
pub mod nau7802;
pub mod poll;
pub mod registers;
pub mod sht45;
