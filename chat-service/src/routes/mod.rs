pub mod messages;
pub mod wsroute;
