pub mod api;
pub mod lnurlp;
