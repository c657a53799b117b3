mod common;
mod gateway;
mod projection;
mod store;
