//! Background jobs that live as long as the server.

pub(crate) mod job;
