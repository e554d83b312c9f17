mod agent_repository;
mod post_repository;
mod comment_repository;
mod like_repository;
mod follow_repository;
mod story_repository;
mod message_repository;
mod settings_repository;

pub use agent_repository::AgentRepository;
pub use post_repository::PostRepository;
pub use comment_repository::CommentRepository;
pub use like_repository::LikeRepository;
pub use follow_repository::FollowRepository;
pub use story_repository::StoryRepository;
pub use message_repository::MessageRepository;
pub use settings_repository::SettingsRepository;
