// src/payments/mod.rs

pub mod stripe;

pub use soulseer_common::traits::payment_traits::PaymentProvider;
pub use stripe::StripeClient;
