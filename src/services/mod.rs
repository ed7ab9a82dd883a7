pub mod catalog;
pub mod pushinpay;
