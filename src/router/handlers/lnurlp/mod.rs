pub mod callback;
pub mod pay_request;
