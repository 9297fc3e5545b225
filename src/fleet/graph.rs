// Leader/follower configuration operations
//
// Every operation either leaves the table untouched or leaves it with:
// - a follower's leader is always a leader itself (one level of indirection)
// - slot A never follows
// - target within [0, max speed of the gearset]
// - followers mirror their leader's gearset and target
//
// Successful operations return the slots whose display needs refreshing.

use tracing::{debug, error, warn};

use super::table::{slot_name, MotorTable};
use crate::config::NUM_MOTORS;
use crate::messages::{ConfigCommand, NudgeDirection};

/// Why a configuration operation was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Motor index {index} is out of range")]
    OutOfRange { index: usize },

    #[error("Motor {} has no port", name(.index))]
    Unconfigured { index: usize },

    #[error("Motor A cannot follow another motor")]
    SlotZeroCannotFollow,

    #[error("Motor {} is a follower and cannot change this setting", name(.index))]
    FollowerLocked { index: usize },

    #[error("No configured leader available for motor {}", name(.index))]
    NoLeaderAvailable { index: usize },
}

fn name(index: &usize) -> char {
    slot_name(*index)
}

fn rejected<T>(err: ConfigError) -> Result<T, ConfigError> {
    match err {
        ConfigError::OutOfRange { .. } => error!("Rejected configuration change: {}", err),
        _ => warn!("Rejected configuration change: {}", err),
    }
    Err(err)
}

impl MotorTable {
    /// Apply a command received from the panel
    pub fn apply(&mut self, command: &ConfigCommand) -> Result<Vec<usize>, ConfigError> {
        match *command {
            ConfigCommand::TogglePower { index } => self.toggle_power(index),
            ConfigCommand::ToggleLeadership { index } => self.toggle_leadership(index),
            ConfigCommand::ToggleReversed { index } => self.toggle_reversed(index),
            ConfigCommand::CycleGearset { index } => self.cycle_gearset(index),
            ConfigCommand::NudgeTarget { index, direction } => self.nudge_target(index, direction),
        }
    }

    /// Promote a follower to leader, or make a leader follow the nearest leader below it
    pub fn toggle_leadership(&mut self, index: usize) -> Result<Vec<usize>, ConfigError> {
        self.check_configurable(index)?;

        if !self.motors()[index].is_leader() {
            debug!("Promoting motor {} to leader", slot_name(index));
            let motor = self.motor_mut(index);
            motor.leader = None;
            // Command source changes, so start from off rather than jump to the old leader's state
            motor.powered = false;
            return Ok(vec![index]);
        }

        if index == 0 {
            return rejected(ConfigError::SlotZeroCannotFollow);
        }

        let Some(leader) = (0..index)
            .rev()
            .find(|&i| self.motors()[i].is_leader() && self.motors()[i].is_configured())
        else {
            return rejected(ConfigError::NoLeaderAvailable { index });
        };

        debug!(
            "Motor {} now follows {}",
            slot_name(index),
            slot_name(leader)
        );
        self.motor_mut(index).leader = Some(leader);
        self.mirror(leader, index);

        // Anyone following us moves to our new leader
        let mut changed = vec![index];
        for j in index + 1..NUM_MOTORS {
            if self.motors()[j].leader == Some(index) {
                debug!(
                    "Motor {} was following {}, now follows {}",
                    slot_name(j),
                    slot_name(index),
                    slot_name(leader)
                );
                self.motor_mut(j).leader = Some(leader);
                self.mirror(leader, j);
                changed.push(j);
            }
        }

        self.debug_check();
        Ok(changed)
    }

    /// Flip the direction of one motor; never propagated to followers
    pub fn toggle_reversed(&mut self, index: usize) -> Result<Vec<usize>, ConfigError> {
        self.check_configurable(index)?;
        let motor = self.motor_mut(index);
        motor.reversed = !motor.reversed;
        debug!(
            "Updating reverse on motor {}, value is now {}",
            slot_name(index),
            motor.reversed
        );
        Ok(vec![index])
    }

    /// Advance a leader to the next gearset and reset its target to that gearset's max
    pub fn cycle_gearset(&mut self, index: usize) -> Result<Vec<usize>, ConfigError> {
        self.check_leader(index)?;
        let motor = self.motor_mut(index);
        motor.gearset = motor.gearset.next();
        motor.target = motor.gearset.max_speed();
        debug!(
            "Updating gearset on motor {}, value is now {}",
            slot_name(index),
            motor.gearset.label()
        );
        let changed = self.mirror_to_followers(index);
        self.debug_check();
        Ok(changed)
    }

    /// Step a leader's target by one gearset step, clamped to the gearset range
    pub fn nudge_target(
        &mut self,
        index: usize,
        direction: NudgeDirection,
    ) -> Result<Vec<usize>, ConfigError> {
        self.check_leader(index)?;
        let motor = self.motor_mut(index);
        let step = direction.sign() * motor.gearset.step_size();
        motor.target = motor.gearset.clamp_target(motor.target.saturating_add(step));
        debug!("Target of motor {} is now {}", slot_name(index), motor.target);
        let changed = self.mirror_to_followers(index);
        self.debug_check();
        Ok(changed)
    }

    /// Switch a leader on or off; its followers go with it
    pub fn toggle_power(&mut self, index: usize) -> Result<Vec<usize>, ConfigError> {
        self.check_leader(index)?;
        let motor = self.motor_mut(index);
        motor.powered = !motor.powered;
        debug!(
            "Changing motor state for {} to {}",
            slot_name(index),
            motor.powered
        );
        let mut changed = vec![index];
        changed.extend(self.followers(index));
        Ok(changed)
    }

    fn check_configurable(&self, index: usize) -> Result<(), ConfigError> {
        match self.get(index) {
            None => rejected(ConfigError::OutOfRange { index }),
            Some(motor) if !motor.is_configured() => rejected(ConfigError::Unconfigured { index }),
            Some(_) => Ok(()),
        }
    }

    fn check_leader(&self, index: usize) -> Result<(), ConfigError> {
        self.check_configurable(index)?;
        if !self.motors()[index].is_leader() {
            return rejected(ConfigError::FollowerLocked { index });
        }
        Ok(())
    }

    /// Copy gearset and target from `leader` onto `follower`
    fn mirror(&mut self, leader: usize, follower: usize) {
        let (gearset, target) = {
            let lead = &self.motors()[leader];
            (lead.gearset, lead.target)
        };
        let motor = self.motor_mut(follower);
        motor.gearset = gearset;
        motor.target = target;
    }

    fn mirror_to_followers(&mut self, leader: usize) -> Vec<usize> {
        let followers: Vec<usize> = self.followers(leader).collect();
        for &follower in &followers {
            debug!(
                "Updating motor {} since it follows {}",
                slot_name(follower),
                slot_name(leader)
            );
            self.mirror(leader, follower);
        }
        let mut changed = vec![leader];
        changed.extend(followers);
        changed
    }

    fn debug_check(&self) {
        debug_assert!(
            self.invariant_violation().is_none(),
            "{:?}",
            self.invariant_violation()
        );
    }
}
