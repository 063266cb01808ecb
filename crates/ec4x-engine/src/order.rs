//! Player orders: the per-house packet and every order enum.
//!
//! Orders are closed discriminated unions; every consumer matches
//! exhaustively. A missing packet is treated as an empty one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::colony::ProjectKind;
use crate::house::TechField;
use crate::ids::{ColonyId, FleetId, HouseId, ShipId, SquadronId, SystemId};
use crate::starmap::PlanetClass;

/// Operational fleet orders. Admitted during the Command Phase; combat
/// orders execute in the next turn's Conflict Phase, movement and posture
/// orders in this turn's Maintenance Phase, Salvage in the next Income
/// Phase after the fleet has survived conflict.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum FleetOrder {
    Hold,
    Move { to: SystemId },
    SeekHome,
    Patrol { system: SystemId },
    GuardStarbase,
    GuardColony,
    Blockade { system: SystemId },
    Bombard { colony: ColonyId },
    Invade { colony: ColonyId },
    Blitz { colony: ColonyId },
    SpyPlanet { colony: ColonyId },
    HackStarbase { colony: ColonyId },
    SpySystem { system: SystemId },
    Colonize { system: SystemId },
    JoinFleet { target: FleetId },
    Rendezvous { system: SystemId, with: FleetId },
    Salvage,
    Reserve,
    Mothball,
    Reactivate,
    View { system: SystemId },
}

impl FleetOrder {
    /// Orders held over for the next turn's Conflict Phase.
    pub fn is_conflict_order(&self) -> bool {
        matches!(
            self,
            FleetOrder::GuardStarbase
                | FleetOrder::GuardColony
                | FleetOrder::Blockade { .. }
                | FleetOrder::Bombard { .. }
                | FleetOrder::Invade { .. }
                | FleetOrder::Blitz { .. }
                | FleetOrder::SpyPlanet { .. }
                | FleetOrder::HackStarbase { .. }
                | FleetOrder::SpySystem { .. }
                | FleetOrder::View { .. }
        )
    }

    /// Orders held over for the next Income Phase.
    pub fn is_income_order(&self) -> bool {
        matches!(self, FleetOrder::Salvage)
    }

    /// Orders executed in this turn's Maintenance Phase.
    pub fn is_maintenance_order(&self) -> bool {
        !self.is_conflict_order() && !self.is_income_order()
    }

    /// Short name for events and rejection reasons.
    pub fn name(&self) -> &'static str {
        match self {
            FleetOrder::Hold => "Hold",
            FleetOrder::Move { .. } => "Move",
            FleetOrder::SeekHome => "SeekHome",
            FleetOrder::Patrol { .. } => "Patrol",
            FleetOrder::GuardStarbase => "GuardStarbase",
            FleetOrder::GuardColony => "GuardColony",
            FleetOrder::Blockade { .. } => "Blockade",
            FleetOrder::Bombard { .. } => "Bombard",
            FleetOrder::Invade { .. } => "Invade",
            FleetOrder::Blitz { .. } => "Blitz",
            FleetOrder::SpyPlanet { .. } => "SpyPlanet",
            FleetOrder::HackStarbase { .. } => "HackStarbase",
            FleetOrder::SpySystem { .. } => "SpySystem",
            FleetOrder::Colonize { .. } => "Colonize",
            FleetOrder::JoinFleet { .. } => "JoinFleet",
            FleetOrder::Rendezvous { .. } => "Rendezvous",
            FleetOrder::Salvage => "Salvage",
            FleetOrder::Reserve => "Reserve",
            FleetOrder::Mothball => "Mothball",
            FleetOrder::Reactivate => "Reactivate",
            FleetOrder::View { .. } => "View",
        }
    }
}

/// Administrative orders executed synchronously during the player window.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ZeroTurnOrder {
    DetachShips {
        fleet: FleetId,
        squadrons: Vec<SquadronId>,
    },
    TransferShips {
        from: FleetId,
        to: FleetId,
        squadrons: Vec<SquadronId>,
    },
    MergeFleets {
        from: FleetId,
        into: FleetId,
    },
    LoadCargo {
        fleet: FleetId,
        ptu: u32,
        marines: u32,
    },
    UnloadCargo {
        fleet: FleetId,
        ptu: u32,
        marines: u32,
    },
    TransferShipBetweenSquadrons {
        fleet: FleetId,
        from_squadron: SquadronId,
        to_squadron: SquadronId,
        ship: ShipId,
    },
    AssignSquadronToFleet {
        squadron: SquadronId,
        from: FleetId,
        to: FleetId,
    },
}

/// Persistent directives that regenerate fleet orders each turn.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum StandingOrder {
    None,
    PatrolRoute { systems: Vec<SystemId> },
    DefendSystem { system: SystemId },
    GuardColony { colony: ColonyId },
    AutoColonize,
    AutoReinforce { colony: ColonyId },
    AutoRepair,
    AutoEvade,
    BlockadeTarget { system: SystemId },
}

/// A build order enqueued at a colony.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct BuildOrder {
    pub colony: ColonyId,
    pub kind: ProjectKind,
}

/// PP committed to research this turn, per field.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResearchAllocation {
    pub per_field: BTreeMap<TechField, u32>,
}

impl ResearchAllocation {
    pub fn total(&self) -> u32 {
        self.per_field.values().sum()
    }
}

/// Direct diplomatic actions.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum DiplomaticAction {
    DeclareHostile { target: HouseId },
    DeclareEnemy { target: HouseId },
    SetNeutral { target: HouseId },
}

/// Space-Guild espionage operations, funded from the EBP pool.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum EspionageAction {
    TechTheft { target: HouseId, field: TechField },
    SabotageLow { target: HouseId },
    SabotageHigh { target: HouseId },
    Assassination { target: HouseId },
    EconomicManipulation { target: HouseId },
    CyberAttack { target: HouseId },
    PsyopsCampaign { target: HouseId },
    IntelligenceTheft { target: HouseId },
    PlantDisinformation { target: HouseId },
    CounterIntelSweep,
    RecruitAgent { target: HouseId },
}

impl EspionageAction {
    pub fn target(&self) -> Option<HouseId> {
        match *self {
            EspionageAction::TechTheft { target, .. }
            | EspionageAction::SabotageLow { target }
            | EspionageAction::SabotageHigh { target }
            | EspionageAction::Assassination { target }
            | EspionageAction::EconomicManipulation { target }
            | EspionageAction::CyberAttack { target }
            | EspionageAction::PsyopsCampaign { target }
            | EspionageAction::IntelligenceTheft { target }
            | EspionageAction::PlantDisinformation { target }
            | EspionageAction::RecruitAgent { target } => Some(target),
            EspionageAction::CounterIntelSweep => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EspionageAction::TechTheft { .. } => "TechTheft",
            EspionageAction::SabotageLow { .. } => "SabotageLow",
            EspionageAction::SabotageHigh { .. } => "SabotageHigh",
            EspionageAction::Assassination { .. } => "Assassination",
            EspionageAction::EconomicManipulation { .. } => "EconomicManipulation",
            EspionageAction::CyberAttack { .. } => "CyberAttack",
            EspionageAction::PsyopsCampaign { .. } => "PsyopsCampaign",
            EspionageAction::IntelligenceTheft { .. } => "IntelligenceTheft",
            EspionageAction::PlantDisinformation { .. } => "PlantDisinformation",
            EspionageAction::CounterIntelSweep => "CounterIntelSweep",
            EspionageAction::RecruitAgent { .. } => "RecruitAgent",
        }
    }
}

/// Colony management directives.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ColonyDirective {
    SetTaxRate { colony: ColonyId, pct: u32 },
    BeginTerraform { colony: ColonyId, target: PlanetClass },
    SetFleetRoe { fleet: FleetId, roe: u8 },
}

/// A civilian population transfer between two colonies.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct PopulationTransfer {
    pub from: ColonyId,
    pub to: ColonyId,
    pub ptu: u32,
}

/// Everything one house submits for one turn.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrderPacket {
    pub fleet_orders: BTreeMap<FleetId, FleetOrder>,
    pub zero_turn_orders: Vec<ZeroTurnOrder>,
    pub standing_orders: BTreeMap<FleetId, StandingOrder>,
    pub build_orders: Vec<BuildOrder>,
    pub research: ResearchAllocation,
    pub diplomatic_actions: Vec<DiplomaticAction>,
    pub espionage_actions: Vec<EspionageAction>,
    pub colony_directives: Vec<ColonyDirective>,
    pub population_transfers: Vec<PopulationTransfer>,
    pub ebp_investment: u32,
    pub cip_investment: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_phase_routing() {
        assert!(FleetOrder::Blockade { system: SystemId(1) }.is_conflict_order());
        assert!(FleetOrder::Invade { colony: ColonyId(1) }.is_conflict_order());
        assert!(FleetOrder::Salvage.is_income_order());
        assert!(FleetOrder::Move { to: SystemId(1) }.is_maintenance_order());
        assert!(FleetOrder::Reserve.is_maintenance_order());
        assert!(FleetOrder::Colonize { system: SystemId(1) }.is_maintenance_order());
        assert!(!FleetOrder::Salvage.is_maintenance_order());
    }

    #[test]
    fn test_espionage_targets() {
        assert_eq!(
            EspionageAction::Assassination { target: HouseId(3) }.target(),
            Some(HouseId(3))
        );
        assert_eq!(EspionageAction::CounterIntelSweep.target(), None);
    }

    #[test]
    fn test_empty_packet_default() {
        let packet = OrderPacket::default();
        assert!(packet.fleet_orders.is_empty());
        assert_eq!(packet.research.total(), 0);
    }
}
