pub mod chunk_planner;
