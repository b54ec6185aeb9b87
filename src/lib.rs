// src/lib.rs

// 1. Data Structures (The "Nouns")
pub mod models;
pub mod error;

// 2. Interfaces (The "Contract")
pub mod traits;

// 3. Adapters (The "Plumbing")
pub mod connectors;

// 4. Core Algorithms (The "Brains")
pub mod locator;
pub mod ticket;

// 5. Draw Sequencing (The "Orchestrator")
pub mod engine;

// 6. Audit Record and Settings
pub mod output;
pub mod config;
