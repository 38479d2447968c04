pub mod db;
pub mod study_llm;

pub use db::PgResourceStore;
pub use study_llm::OpenAiStudyAdapter;
