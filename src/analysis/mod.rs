// Analysis domain logic: prompt construction, repository fetching and
// uploaded-file text extraction. Routes and workers stay thin over this.

pub mod extract;
pub mod fetch;
pub mod prompts;
