//! Implementation of the setpoint generator

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use nalgebra::Vector2;
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, PI};
use util::maths::{clamp, epsilon_equals, wrap_to_pi};

use super::{
    root_finding::{find_drive_max_s, find_steering_max_s},
    DriveConstraints, DriveFeedforwards, Setpoint, SetpointGenError, SetpointGenParams, EPSILON,
    MIN_FEEDFORWARD_FORCE_N,
};
use crate::{
    kinematics::{desaturate_wheel_speeds, ChassisSpeeds, ModuleState},
    robot_model::{RobotModel, NOMINAL_VOLTAGE_V},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default lowest supply voltage the generator plans for.
///
/// Units: volts
pub const DEFAULT_BROWNOUT_VOLTAGE_V: f64 = 6.75;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Generates dynamically feasible setpoints for a [`RobotModel`].
#[derive(Clone, Debug)]
pub struct SetpointGen {
    model: RobotModel,

    /// Units: radians/second
    max_steer_rate_rads: f64,

    /// Units: volts
    brownout_voltage_v: f64,

    /// Units: volts
    nominal_voltage_v: f64,

    /// Constraints used by [`SetpointGen::generate`].
    constraints: Option<DriveConstraints>,
}

/// Status report describing what limited a generated setpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct GenReport {
    /// Fraction of the way from the previous to the desired chassis speeds that was achieved.
    pub interp_s: f64,

    /// The desired speeds were a full stop.
    pub full_stop: bool,

    /// Every module would have had to turn more than 90 degrees, so the chassis is being brought
    /// to rest instead.
    pub chassis_flip: bool,

    /// The steering rate limited the setpoint.
    pub steer_limited: bool,

    /// The available drive force limited the setpoint.
    pub drive_limited: bool,

    /// Supply voltage used after substituting the nominal voltage and applying the brownout
    /// floor.
    ///
    /// Units: volts
    pub input_voltage_v: f64,
}

/// Module states and flags derived from one target velocity.
struct Plan {
    desired_speeds: ChassisSpeeds,
    desired_states: Vec<ModuleState>,
    need_to_steer: bool,
    all_modules_flip: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SetpointGen {
    /// Create a new generator for the given robot.
    pub fn new(model: RobotModel, max_steer_rate_rads: f64) -> Result<Self, SetpointGenError> {
        if !(max_steer_rate_rads.is_finite() && max_steer_rate_rads > 0.0) {
            return Err(SetpointGenError::InvalidSteerRate(max_steer_rate_rads));
        }

        Ok(Self {
            model,
            max_steer_rate_rads,
            brownout_voltage_v: DEFAULT_BROWNOUT_VOLTAGE_V,
            nominal_voltage_v: NOMINAL_VOLTAGE_V,
            constraints: None,
        })
    }

    /// Create a new generator from its parameters.
    pub fn init(model: RobotModel, params: &SetpointGenParams) -> Result<Self, SetpointGenError> {
        let mut gen = Self::new(model, params.max_steer_rate_rads)?;
        gen.brownout_voltage_v = params.brownout_voltage_v;
        gen.nominal_voltage_v = params.nominal_voltage_v;
        gen.constraints = params.constraints;

        Ok(gen)
    }

    pub fn with_brownout_voltage(mut self, brownout_voltage_v: f64) -> Self {
        self.brownout_voltage_v = brownout_voltage_v;
        self
    }

    pub fn with_constraints(mut self, constraints: Option<DriveConstraints>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn model(&self) -> &RobotModel {
        &self.model
    }

    pub fn max_steer_rate_rads(&self) -> f64 {
        self.max_steer_rate_rads
    }

    pub fn constraints(&self) -> Option<&DriveConstraints> {
        self.constraints.as_ref()
    }

    /// Generate the next setpoint using the configured constraints and the nominal voltage.
    pub fn generate(
        &self,
        prev: &Setpoint,
        desired: &ChassisSpeeds,
        dt_s: f64,
    ) -> Result<Setpoint, SetpointGenError> {
        self.generate_with(prev, desired, self.constraints.as_ref(), dt_s, std::f64::NAN)
    }

    /// Generate the next setpoint.
    ///
    /// An `input_voltage_v` of NaN means the supply voltage is unknown, in which case the nominal
    /// voltage is assumed.
    pub fn generate_with(
        &self,
        prev: &Setpoint,
        desired: &ChassisSpeeds,
        constraints: Option<&DriveConstraints>,
        dt_s: f64,
        input_voltage_v: f64,
    ) -> Result<Setpoint, SetpointGenError> {
        self.generate_report(prev, desired, constraints, dt_s, input_voltage_v)
            .map(|(setpoint, _)| setpoint)
    }

    /// Generate the next setpoint along with a report of what limited it.
    pub fn generate_report(
        &self,
        prev: &Setpoint,
        desired: &ChassisSpeeds,
        constraints: Option<&DriveConstraints>,
        dt_s: f64,
        input_voltage_v: f64,
    ) -> Result<(Setpoint, GenReport), SetpointGenError> {
        if !(dt_s.is_finite() && dt_s > 0.0) {
            return Err(SetpointGenError::InvalidPeriod(dt_s));
        }

        let num_modules = self.model.num_modules();
        if prev.module_states.len() != num_modules {
            return Err(SetpointGenError::ModuleCountMismatch {
                expected: num_modules,
                found: prev.module_states.len(),
            });
        }

        let voltage_v = if input_voltage_v.is_nan() {
            self.nominal_voltage_v
        } else {
            input_voltage_v.max(self.brownout_voltage_v)
        };
        let max_speed_ms = self.model.module_config().max_drive_velocity_ms
            * (voltage_v / self.nominal_voltage_v).min(1.0);

        let mut report = GenReport {
            input_voltage_v: voltage_v,
            ..Default::default()
        };

        // ---- TARGET ----

        let target = match constraints {
            Some(c) => {
                let limited = c.limit_velocity(desired);
                if !limited.epsilon_equals(desired, EPSILON) {
                    debug!("Desired speeds {:?} limited to {:?}", desired, limited);
                }
                limited
            }
            None => *desired,
        };

        let mut plan = self.plan(prev, &target, max_speed_ms);

        let zero = ChassisSpeeds::default();
        if plan.all_modules_flip
            && !prev.robot_relative_speeds.epsilon_equals(&zero, EPSILON)
            && !plan.desired_speeds.epsilon_equals(&zero, EPSILON)
        {
            debug!(
                "All modules must turn more than 90 deg to reach {:?}, stopping the chassis first",
                plan.desired_speeds
            );
            report.chassis_flip = true;
            plan = self.plan(prev, &zero, max_speed_ms);
        }
        report.full_stop = !plan.need_to_steer;

        let prev_speeds = &prev.robot_relative_speeds;
        let dx = plan.desired_speeds.vx_ms - prev_speeds.vx_ms;
        let dy = plan.desired_speeds.vy_ms - prev_speeds.vy_ms;
        let domega = plan.desired_speeds.omega_rads - prev_speeds.omega_rads;

        let prev_vel: Vec<(f64, f64)> = prev.module_states.iter().map(|s| s.velocity()).collect();
        let desired_vel: Vec<(f64, f64)> =
            plan.desired_states.iter().map(|s| s.velocity()).collect();

        let mut min_s = 1.0;
        let mut override_steering: Vec<Option<f64>> = vec![None; num_modules];
        let mut max_steer_steps_rad = vec![dt_s * self.max_steer_rate_rads; num_modules];

        // ---- STEERING ----

        if self.model.is_holonomic() {
            let mass_per_module_kg = self.model.mass_kg() / num_modules as f64;

            for m in 0..num_modules {
                let prev_state = &prev.module_states[m];
                let desired_state = &plan.desired_states[m];

                if !plan.need_to_steer {
                    override_steering[m] = Some(prev_state.angle_rad);
                    continue;
                }

                let mut max_theta_step_rad = dt_s * self.max_steer_rate_rads;

                if epsilon_equals(prev_state.speed_ms, 0.0, EPSILON) {
                    // Modules at rest steer in place
                    if epsilon_equals(desired_state.speed_ms, 0.0, EPSILON) {
                        override_steering[m] = Some(prev_state.angle_rad);
                        continue;
                    }

                    let mut necessary_rad =
                        wrap_to_pi(desired_state.angle_rad - prev_state.angle_rad);
                    if necessary_rad.abs() > FRAC_PI_2 {
                        necessary_rad = wrap_to_pi(necessary_rad + PI);
                    }

                    if necessary_rad.abs() / max_theta_step_rad <= 1.0 {
                        override_steering[m] = Some(desired_state.angle_rad);
                    } else {
                        override_steering[m] = Some(wrap_to_pi(
                            prev_state.angle_rad + necessary_rad.signum() * max_theta_step_rad,
                        ));
                        min_s = 0.0;
                    }
                    continue;
                }

                if min_s == 0.0 {
                    continue;
                }

                // Turning a moving wheel needs lateral grip
                max_theta_step_rad = max_theta_step_rad.min(
                    dt_s * self.model.wheel_friction_force_n()
                        / (mass_per_module_kg * prev_state.speed_ms.abs()),
                );
                max_steer_steps_rad[m] = max_theta_step_rad;

                let s = find_steering_max_s(
                    prev_vel[m].0,
                    prev_vel[m].1,
                    prev_state.travel_heading(),
                    desired_vel[m].0,
                    desired_vel[m].1,
                    desired_state.travel_heading(),
                    max_theta_step_rad,
                );
                min_s = f64::min(min_s, s);
            }

            if min_s < 1.0 {
                report.steer_limited = true;
                debug!("Steering rate limits interpolation to s = {:.4}", min_s);
            }
        }

        // ---- DRIVE ----

        let steer_s = min_s;
        if min_s > 0.0 {
            let (accel, angular_accel) = self.chassis_accel_limits(prev, &plan, voltage_v);
            let (accel, angular_accel) = match constraints {
                Some(c) => c.limit_acceleration(accel, angular_accel),
                None => (accel, angular_accel),
            };

            let accel_states = self.model.to_module_states(&ChassisSpeeds::new(
                accel.x,
                accel.y,
                angular_accel,
            ));

            for m in 0..num_modules {
                if min_s == 0.0 {
                    break;
                }

                let max_vel_step_ms = (accel_states[m].speed_ms * dt_s).abs();

                let (vx_min_s, vy_min_s) = if min_s == 1.0 {
                    desired_vel[m]
                } else {
                    (
                        (desired_vel[m].0 - prev_vel[m].0) * min_s + prev_vel[m].0,
                        (desired_vel[m].1 - prev_vel[m].1) * min_s + prev_vel[m].1,
                    )
                };

                // `s` is a fraction of the already limited step
                let s = find_drive_max_s(
                    prev_vel[m].0,
                    prev_vel[m].1,
                    vx_min_s,
                    vy_min_s,
                    max_vel_step_ms,
                );
                min_s *= s;
            }

            if min_s < steer_s {
                report.drive_limited = true;
                debug!("Drive force limits interpolation to s = {:.4}", min_s);
            }
        }
        report.interp_s = min_s;

        // ---- RESULT ----

        let mut ret_speeds = ChassisSpeeds::new(
            prev_speeds.vx_ms + min_s * dx,
            prev_speeds.vy_ms + min_s * dy,
            prev_speeds.omega_rads + min_s * domega,
        )
        .discretize(dt_s);

        // Discretizing a turning chassis lengthens the translation slightly
        let mut ret_states = self.model.to_module_states(&ret_speeds);
        let max_module_speed_ms = self.model.module_config().max_drive_velocity_ms;
        if ret_states
            .iter()
            .any(|s| s.speed_ms.abs() > max_module_speed_ms)
        {
            desaturate_wheel_speeds(&mut ret_states, max_module_speed_ms);
            ret_speeds = self.model.to_chassis_speeds(&ret_states);
        }

        if self.model.is_holonomic()
            && plan.need_to_steer
            && limit_steering(prev, &mut ret_states, &override_steering, &max_steer_steps_rad)
        {
            report.steer_limited = true;
        }

        let feedforwards = self.feedforwards(
            prev,
            &ret_speeds,
            &mut ret_states,
            &override_steering,
            dt_s,
        );

        trace!(
            "Setpoint {:?} from {:?} towards {:?} (s = {:.4})",
            ret_speeds,
            prev_speeds,
            plan.desired_speeds,
            min_s
        );

        Ok((
            Setpoint {
                robot_relative_speeds: ret_speeds,
                module_states: ret_states,
                feedforwards,
            },
            report,
        ))
    }

    /// Desaturate the target and derive the module states and flags from it.
    fn plan(&self, prev: &Setpoint, target: &ChassisSpeeds, max_speed_ms: f64) -> Plan {
        let mut desired_states = self.model.to_module_states(target);
        desaturate_wheel_speeds(&mut desired_states, max_speed_ms);
        let desired_speeds = self.model.to_chassis_speeds(&desired_states);

        let mut need_to_steer = true;
        if desired_speeds.epsilon_equals(&ChassisSpeeds::default(), EPSILON) {
            need_to_steer = false;
            for (d, p) in desired_states.iter_mut().zip(prev.module_states.iter()) {
                d.angle_rad = p.angle_rad;
                d.speed_ms = 0.0;
            }
        }

        // Any module within 90 degrees of its target disables the flip
        let all_modules_flip = self.model.is_holonomic()
            && prev
                .module_states
                .iter()
                .zip(desired_states.iter())
                .all(|(p, d)| wrap_to_pi(d.travel_heading() - p.travel_heading()).abs() >= FRAC_PI_2);

        Plan {
            desired_speeds,
            desired_states,
            need_to_steer,
            all_modules_flip,
        }
    }

    /// Largest chassis acceleration the drive motors and wheel grip can produce this cycle.
    fn chassis_accel_limits(
        &self,
        prev: &Setpoint,
        plan: &Plan,
        voltage_v: f64,
    ) -> (Vector2<f64>, f64) {
        let mc = self.model.module_config();
        let motor = &mc.drive_motor;
        let limit_a = mc.drive_current_limit_a;

        let mut chassis_force = Vector2::<f64>::zeros();
        let mut chassis_torque_nm = 0.0;

        for (m, prev_state) in prev.module_states.iter().enumerate() {
            let last_vel_rads = (prev_state.speed_ms / mc.wheel_radius_m).abs();

            let fwd_current_a = clamp(&motor.current_at(last_vel_rads, voltage_v), &0.0, &limit_a);
            let rev_current_a = motor.current_at(last_vel_rads, -voltage_v).abs().min(limit_a);

            let prev_speed_ms = prev_state.speed_ms;
            let desired_speed_ms = plan.desired_states[m]
                .optimized(prev_state.angle_rad)
                .speed_ms;

            let accelerating = epsilon_equals(prev_speed_ms, 0.0, EPSILON)
                || (prev_speed_ms > 0.0 && desired_speed_ms >= prev_speed_ms)
                || (prev_speed_ms < 0.0 && desired_speed_ms <= prev_speed_ms);

            let mut force_angle_rad = prev_state.angle_rad;
            let (torque_nm, sign) = if accelerating {
                if prev_speed_ms < 0.0 {
                    force_angle_rad += PI;
                }
                (motor.torque(fwd_current_a) - mc.torque_loss_nm, 1.0)
            } else {
                if prev_speed_ms > 0.0 {
                    force_angle_rad += PI;
                }
                (motor.torque(rev_current_a) + mc.torque_loss_nm, -1.0)
            };

            let torque_nm = torque_nm.min(self.model.max_torque_friction_nm());
            let force_at_carpet_n = torque_nm / mc.wheel_radius_m;
            let force = Vector2::new(force_angle_rad.cos(), force_angle_rad.sin())
                * (force_at_carpet_n * sign);

            chassis_force += force;

            if !epsilon_equals(force.norm(), 0.0, EPSILON) {
                let location = &self.model.module_locations_m()[m];
                let angle_diff = force.y.atan2(force.x) - location.y.atan2(location.x);
                chassis_torque_nm += force_at_carpet_n
                    * self.model.module_pivot_distance_m()[m]
                    * angle_diff.sin();
            }
        }

        (
            chassis_force / self.model.mass_kg(),
            chassis_torque_nm / self.model.moi_kgm2(),
        )
    }

    /// Compute the feedforwards for the new setpoint, applying the steering overrides.
    fn feedforwards(
        &self,
        prev: &Setpoint,
        ret_speeds: &ChassisSpeeds,
        ret_states: &mut [ModuleState],
        override_steering: &[Option<f64>],
        dt_s: f64,
    ) -> DriveFeedforwards {
        let mc = self.model.module_config();
        let prev_speeds = &prev.robot_relative_speeds;

        let chassis_forces = ChassisSpeeds::new(
            self.model.mass_kg() * (ret_speeds.vx_ms - prev_speeds.vx_ms) / dt_s,
            self.model.mass_kg() * (ret_speeds.vy_ms - prev_speeds.vy_ms) / dt_s,
            self.model.moi_kgm2() * (ret_speeds.omega_rads - prev_speeds.omega_rads) / dt_s,
        );
        let wheel_forces = self.model.chassis_forces_to_wheel_force_vectors(&chassis_forces);

        let mut ff = DriveFeedforwards::zeros(ret_states.len());

        for (m, state) in ret_states.iter_mut().enumerate() {
            let wheel_force = &wheel_forces[m];
            let wheel_force_n = wheel_force.norm();

            let mut applied_force_n = if wheel_force_n > MIN_FEEDFORWARD_FORCE_N {
                wheel_force_n * (wheel_force.y.atan2(wheel_force.x) - state.angle_rad).cos()
            } else {
                0.0
            };
            let mut torque_current_a =
                mc.drive_motor.current_for_torque(applied_force_n * mc.wheel_radius_m);

            if let Some(override_rad) = override_steering[m] {
                if wrap_to_pi(override_rad - state.angle_rad).abs() > FRAC_PI_2 {
                    state.speed_ms = -state.speed_ms;
                    applied_force_n = -applied_force_n;
                    torque_current_a = -torque_current_a;
                }
                state.angle_rad = override_rad;
            }

            let prev_state = &prev.module_states[m];
            if wrap_to_pi(state.angle_rad - prev_state.angle_rad).abs() > FRAC_PI_2 {
                state.angle_rad = wrap_to_pi(state.angle_rad + PI);
                state.speed_ms = -state.speed_ms;
                applied_force_n = -applied_force_n;
                torque_current_a = -torque_current_a;
            }

            ff.accelerations_mss[m] = (state.speed_ms - prev_state.speed_ms) / dt_s;
            ff.linear_forces_n[m] = applied_force_n;
            ff.torque_currents_a[m] = torque_current_a;
            ff.robot_relative_forces_x_n[m] = wheel_force.x;
            ff.robot_relative_forces_y_n[m] = wheel_force.y;
        }

        ff
    }
}

/// Hold each free module's heading within its steering step of the previous heading.
///
/// Discretization and the root finding tolerance can leave a heading marginally past the step
/// found during interpolation, and a module with no speed has no heading of its own. Returns
/// `true` if any module was limited.
fn limit_steering(
    prev: &Setpoint,
    ret_states: &mut [ModuleState],
    override_steering: &[Option<f64>],
    max_steps_rad: &[f64],
) -> bool {
    let mut limited = false;

    for (m, state) in ret_states.iter_mut().enumerate() {
        if override_steering[m].is_some() {
            continue;
        }

        let prev_angle_rad = prev.module_states[m].angle_rad;

        if state.speed_ms.abs() < EPSILON {
            state.angle_rad = prev_angle_rad;
            continue;
        }

        let delta_rad = wrap_to_pi(state.angle_rad - prev_angle_rad);
        let (delta_rad, flipped) = if delta_rad.abs() > FRAC_PI_2 {
            (wrap_to_pi(delta_rad + PI), true)
        } else {
            (delta_rad, false)
        };

        if delta_rad.abs() > max_steps_rad[m] {
            trace!(
                "Module {} heading change {:.6} rad limited to {:.6} rad",
                m,
                delta_rad,
                max_steps_rad[m]
            );
            state.angle_rad = wrap_to_pi(prev_angle_rad + max_steps_rad[m].copysign(delta_rad));
            if flipped {
                state.speed_ms = -state.speed_ms;
            }
            limited = true;
        }
    }

    limited
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::robot_model::{ModuleConfig, MotorType, GRAVITY_MSS};

    const DT_S: f64 = 0.02;
    const STEER_RATE_RADS: f64 = 10.0;
    const MAX_SPEED_MS: f64 = 5.45;
    const COF: f64 = 1.2;

    fn module_config() -> ModuleConfig {
        ModuleConfig::new(
            0.048,
            MAX_SPEED_MS,
            COF,
            MotorType::KrakenX60.dc_motor().with_reduction(5.143),
            60.0,
            1,
        )
    }

    fn swerve_gen() -> SetpointGen {
        let model = RobotModel::holonomic(74.0, 6.9, module_config(), 0.5, 0.6).unwrap();
        SetpointGen::new(model, STEER_RATE_RADS).unwrap()
    }

    /// A setpoint already moving at `speeds` with consistent module states.
    fn moving(gen: &SetpointGen, speeds: ChassisSpeeds) -> Setpoint {
        let mut sp = Setpoint::starting(gen.model());
        sp.robot_relative_speeds = speeds;
        sp.module_states = gen.model().to_module_states(&speeds);
        sp
    }

    /// Heading change between two module states, ignoring drive direction.
    fn steer_change(state: &ModuleState, prev: &ModuleState) -> f64 {
        let change = wrap_to_pi(state.angle_rad - prev.angle_rad).abs();
        change.min(PI - change)
    }

    #[test]
    fn test_invalid_inputs() {
        let gen = swerve_gen();
        let prev = Setpoint::starting(gen.model());
        let desired = ChassisSpeeds::new(1.0, 0.0, 0.0);

        assert!(matches!(
            gen.generate(&prev, &desired, 0.0),
            Err(SetpointGenError::InvalidPeriod(_))
        ));
        assert!(matches!(
            gen.generate(&prev, &desired, std::f64::NAN),
            Err(SetpointGenError::InvalidPeriod(_))
        ));

        let mut short = prev.clone();
        short.module_states.truncate(2);
        assert!(matches!(
            gen.generate(&short, &desired, DT_S),
            Err(SetpointGenError::ModuleCountMismatch {
                expected: 4,
                found: 2
            })
        ));

        let model = gen.model().clone();
        assert!(matches!(
            SetpointGen::new(model, 0.0),
            Err(SetpointGenError::InvalidSteerRate(_))
        ));
    }

    #[test]
    fn test_full_stop() {
        let gen = swerve_gen();
        let mut prev = moving(&gen, ChassisSpeeds::new(0.05, 0.0, 0.0));
        for (i, s) in prev.module_states.iter_mut().enumerate() {
            s.angle_rad = 0.1 * i as f64;
        }

        let (sp, report) = gen
            .generate_report(&prev, &ChassisSpeeds::default(), None, DT_S, std::f64::NAN)
            .unwrap();

        assert!(report.full_stop);
        assert!(!report.chassis_flip);
        for (s, p) in sp.module_states.iter().zip(prev.module_states.iter()) {
            assert_eq!(s.speed_ms, 0.0);
            assert_eq!(s.angle_rad, p.angle_rad);
        }
    }

    #[test]
    fn test_full_stop_over_many_cycles() {
        let gen = swerve_gen();
        let start = moving(&gen, ChassisSpeeds::new(3.0, 1.0, 0.5));
        let zero = ChassisSpeeds::default();

        let mut prev = start.clone();
        let mut cycles = 0;
        while prev.robot_relative_speeds != zero && cycles < 200 {
            let (sp, report) = gen
                .generate_report(&prev, &zero, None, DT_S, std::f64::NAN)
                .unwrap();
            assert!(report.full_stop);

            // Headings stay where they were while the speed ramps down
            for (s, p) in sp.module_states.iter().zip(start.module_states.iter()) {
                assert_eq!(s.angle_rad, p.angle_rad);
            }
            assert!(
                sp.robot_relative_speeds.linear_speed_ms()
                    <= prev.robot_relative_speeds.linear_speed_ms()
            );

            prev = sp;
            cycles += 1;
        }

        assert!(cycles > 1, "stopped in {} cycles", cycles);
        assert_eq!(prev.robot_relative_speeds, zero);
        for s in prev.module_states.iter() {
            assert_eq!(s.speed_ms, 0.0);
        }
    }

    #[test]
    fn test_steering_rate_varied_targets() {
        let gen = swerve_gen();
        let max_step_rad = DT_S * STEER_RATE_RADS;
        let mut prev = Setpoint::starting(gen.model());
        let mut desired = ChassisSpeeds::default();

        for i in 0..4000 {
            if i % 50 == 0 {
                prev = Setpoint::starting(gen.model());
            }

            // A new target every few cycles, spread over all directions and turn rates
            if i % 5 == 0 {
                let k = (i / 5) as f64;
                desired = ChassisSpeeds::new(
                    4.0 * (1.3 * k).sin(),
                    4.0 * (2.1 * k + 0.5).sin(),
                    6.0 * (0.7 * k).sin(),
                );
            }

            let sp = gen.generate(&prev, &desired, DT_S).unwrap();

            for (m, (s, p)) in sp
                .module_states
                .iter()
                .zip(prev.module_states.iter())
                .enumerate()
            {
                let change = steer_change(s, p);
                assert!(
                    change <= max_step_rad + 1e-9,
                    "cycle {} module {} turned {} rad",
                    i,
                    m,
                    change
                );
                assert!(s.speed_ms.abs() <= MAX_SPEED_MS + 1e-9);
            }

            prev = sp;
        }
    }

    #[test]
    fn test_speed_and_accel_limits() {
        let gen = swerve_gen();
        let desired = ChassisSpeeds::new(10.0, 5.0, 0.0);
        let mut prev = Setpoint::starting(gen.model());

        for _ in 0..200 {
            let sp = gen.generate(&prev, &desired, DT_S).unwrap();

            for (s, a) in sp
                .module_states
                .iter()
                .zip(sp.feedforwards.accelerations_mss.iter())
            {
                assert!(s.speed_ms.abs() <= MAX_SPEED_MS + 1e-9);
                assert!(a.abs() <= COF * GRAVITY_MSS + 1e-6);
            }

            prev = sp;
        }

        // Eventually the robot reaches the desaturated desired speed
        assert!((prev.robot_relative_speeds.linear_speed_ms() - MAX_SPEED_MS).abs() < 1e-6);
    }

    #[test]
    fn test_steering_rate() {
        let gen = swerve_gen();
        let mut prev = moving(&gen, ChassisSpeeds::new(1.0, 0.0, 0.0));
        let heading = std::f64::consts::FRAC_PI_3;
        let desired = ChassisSpeeds::new(heading.cos(), heading.sin(), 0.0);

        let (_, report) = gen
            .generate_report(&prev, &desired, None, DT_S, std::f64::NAN)
            .unwrap();
        assert!(report.steer_limited);
        assert!(report.interp_s < 1.0);

        for _ in 0..100 {
            let sp = gen.generate(&prev, &desired, DT_S).unwrap();

            for (s, p) in sp.module_states.iter().zip(prev.module_states.iter()) {
                assert!(steer_change(s, p) <= DT_S * STEER_RATE_RADS + 1e-9);
            }

            prev = sp;
        }

        assert!(prev.robot_relative_speeds.epsilon_equals(&desired, 1e-6));
    }

    #[test]
    fn test_steer_in_place_from_rest() {
        let gen = swerve_gen();
        let prev = Setpoint::starting(gen.model());
        let desired = ChassisSpeeds::new(0.0, 1.0, 0.0);

        let (sp, report) = gen
            .generate_report(&prev, &desired, None, DT_S, std::f64::NAN)
            .unwrap();

        // Wheels turn by one step towards 90 degrees before driving
        assert_eq!(report.interp_s, 0.0);
        for s in sp.module_states.iter() {
            assert_eq!(s.speed_ms, 0.0);
            assert!((s.angle_rad - DT_S * STEER_RATE_RADS).abs() < 1e-12);
        }
    }

    #[test]
    fn test_chassis_flip() {
        let gen = swerve_gen();
        let prev = moving(&gen, ChassisSpeeds::new(1.0, 0.0, 0.0));

        let (sp, report) = gen
            .generate_report(
                &prev,
                &ChassisSpeeds::new(-1.0, 0.0, 0.0),
                None,
                DT_S,
                std::f64::NAN,
            )
            .unwrap();

        assert!(report.chassis_flip);
        assert!(sp.robot_relative_speeds.vx_ms > 0.0);
        assert!(sp.robot_relative_speeds.vx_ms < 1.0);
        for (s, p) in sp.module_states.iter().zip(prev.module_states.iter()) {
            assert_eq!(s.angle_rad, p.angle_rad);
        }
    }

    #[test]
    fn test_differential() {
        let model = RobotModel::differential(60.0, 5.0, module_config(), 0.6).unwrap();
        let gen = SetpointGen::new(model, STEER_RATE_RADS).unwrap();

        let prev = Setpoint::starting(gen.model());
        let sp = gen
            .generate(&prev, &ChassisSpeeds::new(1.0, 0.0, 0.0), DT_S)
            .unwrap();
        assert!(sp.module_states[0].speed_ms > 0.0);
        assert!(sp.module_states[0].speed_ms < 1.0);
        assert!((sp.module_states[0].speed_ms - sp.module_states[1].speed_ms).abs() < 1e-9);

        // Reversing never flips the chassis since the wheels cannot steer
        let prev = moving(&gen, ChassisSpeeds::new(1.0, 0.0, 0.0));
        let (sp, report) = gen
            .generate_report(
                &prev,
                &ChassisSpeeds::new(-1.0, 0.0, 0.0),
                None,
                DT_S,
                std::f64::NAN,
            )
            .unwrap();
        assert!(!report.chassis_flip);
        assert!(sp.robot_relative_speeds.vx_ms < 1.0);
        for s in sp.module_states.iter() {
            assert_eq!(s.angle_rad, 0.0);
        }
    }

    #[test]
    fn test_voltage() {
        let gen = swerve_gen().with_brownout_voltage(6.75);
        let prev = moving(&gen, ChassisSpeeds::new(MAX_SPEED_MS, 0.0, 0.0));
        let desired = ChassisSpeeds::new(MAX_SPEED_MS, 0.0, 0.0);

        let (sp, report) = gen
            .generate_report(&prev, &desired, None, DT_S, std::f64::NAN)
            .unwrap();
        assert_eq!(report.input_voltage_v, NOMINAL_VOLTAGE_V);
        assert!((sp.robot_relative_speeds.vx_ms - MAX_SPEED_MS).abs() < 1e-9);

        // A sagging battery cannot hold top speed
        let (sp, report) = gen
            .generate_report(&prev, &desired, None, DT_S, 3.0)
            .unwrap();
        assert_eq!(report.input_voltage_v, 6.75);
        assert!(sp.robot_relative_speeds.vx_ms < MAX_SPEED_MS);
    }

    #[test]
    fn test_constraints() {
        let constraints = DriveConstraints {
            max_velocity_ms: 1.0,
            max_angular_velocity_rads: 1.0,
            max_acceleration_mss: 2.0,
            max_angular_acceleration_radss: 2.0,
        };
        let gen = swerve_gen().with_constraints(Some(constraints));
        let prev = Setpoint::starting(gen.model());
        let desired = ChassisSpeeds::new(3.0, 0.0, 0.0);

        let sp = gen.generate(&prev, &desired, DT_S).unwrap();
        assert!((sp.robot_relative_speeds.vx_ms - 2.0 * DT_S).abs() < 1e-9);

        let mut prev = sp;
        for _ in 0..100 {
            prev = gen.generate(&prev, &desired, DT_S).unwrap();
        }
        assert!((prev.robot_relative_speeds.vx_ms - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_feedforwards() {
        let gen = swerve_gen();
        let prev = Setpoint::starting(gen.model());
        let desired = ChassisSpeeds::new(1.0, 0.0, 0.0);

        let sp = gen.generate(&prev, &desired, DT_S).unwrap();
        let ff = &sp.feedforwards;

        let accel = sp.robot_relative_speeds.vx_ms / DT_S;
        for m in 0..4 {
            assert!((ff.accelerations_mss[m] - accel).abs() < 1e-9);
            assert!((ff.robot_relative_forces_x_n[m] - 74.0 * accel / 4.0).abs() < 1e-6);
            assert!(ff.robot_relative_forces_y_n[m].abs() < 1e-9);
            assert!(ff.linear_forces_n[m] > 0.0);
            assert!(ff.torque_currents_a[m] > 0.0);
        }
    }
}
