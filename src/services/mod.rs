// Lifecycle contract: transition table and history projections
pub mod lifecycle;

// Listing and reporting helpers that work on ticket slices
pub mod aggregation;
pub mod ticket_query;

// Last-request-wins and duplicate submission guards
pub mod request_sequencer;

// Workflow orchestration on top of the HTTP adapter
pub mod tickets;
