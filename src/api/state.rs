use crate::service::consumption::ConsumptionService;

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * The consumption service for handling record and aggregation operations.
     */
    pub consumption_service: ConsumptionService,
}

/**
 * Creates a new instance of `AppState`.
 *
 * # Arguments
 * `consumption_service`: The consumption service for handling record and aggregation operations.
 */
impl AppState {
    pub fn new(consumption_service: ConsumptionService) -> Self {
        AppState { consumption_service }
    }
}
