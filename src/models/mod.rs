// Model exports
pub mod domain;
pub mod requests;
pub mod responses;
pub mod schema;

pub use domain::{Difficulty, Grade, IncomeBand, MatchResult, MatchStrategy, NewOffer, Offer, Profile, UnknownVariant};
pub use requests::{CreateProfileRequest, MatchResultsQuery, RequestMatchRequest};
pub use responses::{ErrorResponse, HealthResponse, RequestMatchResponse};
pub use schema::{match_response_schema, MatchEntry, MatchSet, MAX_RESULTS};
