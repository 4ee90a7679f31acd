//! Rust client for the hosted habit tracker backend
//!
//! The backend exposes two surfaces under one base URL:
//! - `/auth/v1/*`: password sign-in, current-user lookup and logout
//! - `/rest/v1/*`: PostgREST-style access to the four record collections
//!   (`habits`, `habit_logs`, `weekly_habits`, `monthly_reflections`)
//!
//! Row-level authorization is enforced server side from the bearer token,
//! so every query is additionally filtered by `user_id` on the client only
//! to keep the result sets explicit.
//!
//! # Example
//!
//! ```rust,no_run
//! use habit_store_client::{StoreClient, StoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StoreClient::new(StoreConfig {
//!     base_url: "https://habits.example.co".into(),
//!     api_key: "public-anon-key".into(),
//!     ..Default::default()
//! })?;
//!
//! client.sign_in_with_password("me@example.com", "hunter2").await?;
//!
//! if let Some(user) = client.get_user().await? {
//!     let habits = client.list_habits(&user.id).await?;
//!     println!("{} habits", habits.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod types;

// Re-export main types
pub use client::StoreClient;
pub use error::{Result, StoreError};
pub use types::*;
