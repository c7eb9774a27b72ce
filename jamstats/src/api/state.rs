use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::QueryPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<QueryPipeline>,
}

impl AppState {
    pub fn new(config: Config, pipeline: QueryPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}
