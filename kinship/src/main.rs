//! Kinship demo
//!
//! Opens a relationship session over a handful of colonists, declares a
//! family and a marriage, and commits the result into a reference world.

use std::sync::Arc;

use kinship::engine::RelationStore;
use kinship::world::PawnSpec;
use kinship::{
    DefDatabase, Gender, Individual, KinshipConfig, PawnKind, RelationshipManager, RelationshipTypeRegistry,
    SimulationWorld,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Kinship relationship builder starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => KinshipConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => KinshipConfig::default(),
    };

    let mut world = SimulationWorld::new();
    world.add_faction("Outlanders", true);
    let registry = Arc::new(RelationshipTypeRegistry::new(DefDatabase::vanilla(), &mut world));
    info!("Allowed relationship types: {}", registry.allowed_types().join(", "));

    let specs = [
        PawnSpec::new("Mara", Gender::Female, 24),
        PawnSpec::new("Tomas", Gender::Male, 19),
        PawnSpec::new("Ilse", Gender::Female, 26),
        PawnSpec::new("Oren", Gender::Male, 52),
    ];
    let mut pawns = Vec::new();
    for spec in specs {
        let pawn = world.spawn_pawn(spec);
        pawns.push(Individual::load(&world, pawn, PawnKind::Colonist)?);
    }
    let ids: Vec<_> = pawns.iter().map(|p| p.id).collect();
    let refs: Vec<_> = pawns.iter().map(|p| p.pawn).collect();

    let mut session = RelationshipManager::new(registry, config, &mut world, pawns);

    // Mara and Tomas are Oren's children; Ilse is married to Tomas.
    session.add_relationship("Parent", ids[3], ids[0]);
    session.add_relationship("Parent", ids[3], ids[1]);
    session.add_relationship("Spouse", ids[2], ids[1]);
    session.add_relationship("Rival", ids[0], ids[2]);

    let report = session.commit(&mut world);
    info!(
        "Commit complete: {} relations created, {} skipped, {} parents synthesized, {} world pawns",
        report.created,
        report.skipped,
        report.synthesized.len(),
        report.world_pawns.len()
    );

    for id in &report.world_pawns {
        if let Some(pawn) = session.roster().get(*id) {
            world.register_world_pawn(pawn.pawn);
            info!("Registered {} ({}), age {}", pawn.name, pawn.id, pawn.biological_age());
        }
    }
    for (id, pawn) in ids.iter().zip(&refs) {
        let relations: Vec<String> = world
            .direct_relations(*pawn)
            .into_iter()
            .map(|r| match world.pawn_id(r.other) {
                Some(other) => format!("{} of {}", other, r.def),
                None => r.def,
            })
            .collect();
        info!("{}: {}", id, relations.join("; "));
    }

    Ok(())
}
