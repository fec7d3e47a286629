pub mod fireeye;
pub mod gateway;
pub mod oracle;
pub mod snapshot;
