pub mod auth;
pub mod catalog;
pub mod journeys;
pub mod payments;
pub mod selection;
