pub mod prompts;

pub use prompts::PromptCli;
pub use prompts::run;
