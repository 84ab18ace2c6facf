//! Core malaria transmission simulator: vector transmission engine,
//! within-host infection model, clinical/decision engine, PK/PD engine,
//! and the simulation driver tying them together (§1-§7).

pub mod clinical;
pub mod driver;
pub mod error;
pub mod genotype;
pub mod id;
pub mod pkpd;
pub mod population;
pub mod rng;
pub mod scenario;
pub mod time;
pub mod vector;
pub mod within_host;

pub use driver::{Cli, Model, Phase, SimulationState, TreatmentTable};
pub use error::CoreError;
pub use genotype::{GenotypeDef, GenotypeId, GenotypeRegistry};
pub use rng::PopulationRng;
pub use scenario::{Scenario, CORE_SCHEMA_VERSION};
pub use time::{SimTime, TimeStep};
