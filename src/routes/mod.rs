pub(crate) mod health;
pub(crate) mod history;
pub(crate) mod jobs;
pub(crate) mod recommendations;
pub(crate) mod scheduler;
