pub mod repository_traits;
pub mod payment_traits;
