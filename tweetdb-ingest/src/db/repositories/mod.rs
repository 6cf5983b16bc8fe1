mod author_repository;
mod post_repository;
mod hashtag_repository;

pub use author_repository::AuthorRepository;
pub use post_repository::PostRepository;
pub use hashtag_repository::HashtagRepository;
