pub mod affirmation;
pub mod engagement;
pub mod post;
pub mod profile;
pub mod resource;
