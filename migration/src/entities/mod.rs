pub mod check_in;
pub mod device_token;
pub mod offer;
pub mod offer_claim;
pub mod offer_event;
pub mod rate_limit_window;
pub mod venue;
pub mod venue_favorite;

pub use check_in::Entity as CheckInEntity;
pub use device_token::Entity as DeviceTokenEntity;
pub use offer::Entity as OfferEntity;
pub use offer_claim::Entity as OfferClaimEntity;
pub use offer_event::Entity as OfferEventEntity;
pub use rate_limit_window::Entity as RateLimitWindowEntity;
pub use venue::Entity as VenueEntity;
pub use venue_favorite::Entity as VenueFavoriteEntity;
