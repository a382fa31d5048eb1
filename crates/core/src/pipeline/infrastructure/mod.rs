pub mod sequential_context_dispatcher;
pub mod threaded_segment_dispatcher;
