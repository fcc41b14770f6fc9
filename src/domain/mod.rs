// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define what the system
// works with:
//
//   - raw dataset records and their typed field accessors
//   - multi-modal payloads (raw array or wrapped array)
//   - generated model outputs for benchmark scoring
//   - the error taxonomy shared by the data and eval layers
//   - the collaborator traits (template, tokenizer, processor,
//     generation engine) that other layers implement
//
// Rules for this layer:
//   - NO Burn tensor construction here (TensorData is only
//     used as a backend-agnostic host buffer)
//   - NO file I/O
//   - Only structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Raw dataset rows and question identifiers
pub mod record;

// Modality payloads attached to preference pairs
pub mod modality;

// Generated outputs consumed by the scoring engine
pub mod inference;

// Typed error taxonomy for the data and eval layers
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
