pub mod journeys;
pub mod locations;
pub mod photos;
