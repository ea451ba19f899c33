pub mod add_request;
