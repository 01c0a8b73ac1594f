pub mod auth;
pub mod feedbacks;
pub mod pages;
pub mod profiles;
pub mod resource;
pub mod skills;
pub mod swap_requests;
pub mod user_skills;
