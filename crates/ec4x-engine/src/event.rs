//! Narrative events for the turn log, plus combat and capacity reports.
//!
//! Events are the engine's audit channel: every state change a player can
//! observe is mirrored by an event. Rejections and failures always carry a
//! human-readable reason.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diplomacy::DiplomaticState;
use crate::fleet::FleetStatus;
use crate::house::TechField;
use crate::ids::{ColonyId, FleetId, HouseId, SquadronId, SystemId};
use crate::phase::Phase;
use crate::starmap::PlanetClass;
use crate::unit::ShipClass;

/// Which capacity category a violation applies to.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapacityCategory {
    CapitalSquadrons,
    TotalSquadrons,
    FightersPerColony,
    PlanetBreakers,
}

/// Severity of a capacity violation.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum CapacitySeverity {
    /// Over cap, inside the grace period.
    Warning,
    /// Over cap with no grace remaining; divestiture was forced.
    Enforced,
}

/// Metadata attached to capacity events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapacityViolation {
    pub house: HouseId,
    pub category: CapacityCategory,
    pub current: u32,
    pub max: u32,
    pub excess: u32,
    pub severity: CapacitySeverity,
    pub grace_remaining: Option<u32>,
}

/// Which combat layer a report covers.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum CombatLayer {
    Space,
    Orbital,
    Ground,
}

/// Per-battle summary for UI consumption.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombatReport {
    pub system: SystemId,
    pub layer: CombatLayer,
    pub victor: Option<HouseId>,
    /// Squadrons (or ground units, for ground combat) lost per house.
    pub losses: BTreeMap<HouseId, u32>,
    pub rounds: u32,
    pub stalemate: bool,
}

/// The turn log event union.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GameEvent {
    // -- Turn structure --
    PhaseCompleted {
        phase: Phase,
        turn: u32,
    },
    TurnResolved {
        turn: u32,
    },

    // -- Order lifecycle --
    OrderRejected {
        house: HouseId,
        fleet: Option<FleetId>,
        order: String,
        reason: String,
    },
    OrderFailed {
        house: HouseId,
        fleet: Option<FleetId>,
        order: String,
        reason: String,
    },
    OrderAborted {
        house: HouseId,
        fleet: FleetId,
        order: String,
        reason: String,
    },
    OrderCompleted {
        house: HouseId,
        fleet: FleetId,
        order: String,
    },

    // -- Fleets and combat --
    FleetArrived {
        fleet: FleetId,
        house: HouseId,
        system: SystemId,
    },
    FleetDestroyed {
        fleet: FleetId,
        house: HouseId,
        system: SystemId,
    },
    FleetRetreated {
        fleet: FleetId,
        house: HouseId,
        from: SystemId,
        toward: Option<SystemId>,
    },
    FleetStatusChanged {
        fleet: FleetId,
        status: FleetStatus,
    },
    SquadronCrippled {
        squadron: SquadronId,
        house: HouseId,
        system: SystemId,
    },
    SquadronDestroyed {
        squadron: SquadronId,
        house: HouseId,
        system: SystemId,
    },
    CloakedForceDetected {
        house: HouseId,
        system: SystemId,
    },
    CombatResolved {
        system: SystemId,
        layer: CombatLayer,
        victor: Option<HouseId>,
        rounds: u32,
        stalemate: bool,
    },

    // -- Blockade --
    BlockadeEstablished {
        system: SystemId,
        controller: HouseId,
        fleet: FleetId,
    },
    BlockadeLifted {
        system: SystemId,
        controller: HouseId,
    },

    // -- Planetary operations --
    BombardmentConducted {
        colony: ColonyId,
        attacker: HouseId,
        infrastructure_destroyed: u32,
        batteries_destroyed: u32,
        ground_units_killed: u32,
    },
    ConstructionDestroyed {
        colony: ColonyId,
    },
    ColonyCaptured {
        colony: ColonyId,
        by: HouseId,
        from: HouseId,
    },
    InvasionRepelled {
        colony: ColonyId,
        attacker: HouseId,
        marines_lost: u32,
    },
    ColonyDepopulated {
        colony: ColonyId,
    },

    // -- Colonization --
    ColonyFounded {
        colony: ColonyId,
        system: SystemId,
        house: HouseId,
    },
    ColonizationConflictLost {
        fleet: FleetId,
        house: HouseId,
        system: SystemId,
        winner: HouseId,
    },

    // -- Espionage --
    EspionageSuccess {
        actor: HouseId,
        target: HouseId,
        operation: String,
    },
    EspionageDetected {
        actor: HouseId,
        target: HouseId,
        operation: String,
    },
    ScoutLost {
        house: HouseId,
        system: SystemId,
        detected_by: HouseId,
    },
    EffectExpired {
        target: HouseId,
        effect: String,
    },

    // -- Economy --
    ProductionCollected {
        house: HouseId,
        amount: u32,
    },
    MaintenancePaid {
        house: HouseId,
        amount: u32,
    },
    MaintenanceShortfall {
        house: HouseId,
        shortfall: u32,
    },
    SalvageCompleted {
        fleet: FleetId,
        house: HouseId,
        refund: u32,
    },
    PopulationTransferred {
        from: ColonyId,
        to: ColonyId,
        ptu: u32,
    },

    // -- Capacity enforcement --
    CapacityExceeded {
        violation: CapacityViolation,
    },
    CapitalShipSeized {
        house: HouseId,
        squadron: SquadronId,
        payment: u32,
    },
    SquadronDisbanded {
        house: HouseId,
        squadron: SquadronId,
    },
    FightersDisbanded {
        colony: ColonyId,
        count: u32,
    },
    PlanetBreakerScrapped {
        house: HouseId,
        fleet: FleetId,
    },

    // -- Construction and research --
    ProjectCompleted {
        colony: ColonyId,
        description: String,
    },
    ShipCommissioned {
        colony: ColonyId,
        fleet: FleetId,
        class: ShipClass,
    },
    TerraformCompleted {
        colony: ColonyId,
        class: PlanetClass,
    },
    TechAdvanced {
        house: HouseId,
        field: TechField,
        level: u32,
    },
    TechSabotaged {
        house: HouseId,
        field: TechField,
        level: u32,
    },

    // -- Diplomacy, prestige, victory --
    DiplomaticRelationChanged {
        house: HouseId,
        toward: HouseId,
        from: DiplomaticState,
        to: DiplomaticState,
        reason: String,
    },
    PrestigeChanged {
        house: HouseId,
        delta: i32,
        reason: String,
    },
    HouseEliminated {
        house: HouseId,
        reason: String,
    },
    VictoryAchieved {
        house: HouseId,
        reason: String,
    },
}
