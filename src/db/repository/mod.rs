pub mod key_value;
pub mod publish_history;
pub mod social_authorization;
pub mod subscription;

pub use key_value::KeyValueRepository;
pub use publish_history::PublishHistoryRepository;
pub use social_authorization::SocialAuthorizationRepository;
pub use subscription::SubscriptionRepository;
