use chrono::{Duration, FixedOffset, TimeZone};
use heatpump_planner::domain::{HourConditions, TuningParameters, ZoneTemps};
use heatpump_planner::optimizer::{ComfortLimits, ScheduleOptimizer};
use heatpump_planner::simulation::{HourStep, ThermalSimulationEngine};
use proptest::prelude::*;

fn horizon(prices: &[f64], outdoor: f64) -> Vec<HourConditions> {
    let start = FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 10, 0, 0, 0)
        .unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(h, &price)| HourConditions {
            timestamp: start + Duration::hours(h as i64),
            local_hour: (h % 24) as u32,
            outdoor_temp: outdoor,
            wind_speed: 0.0,
            wind_direction: 0.0,
            cloud_cover: 8.0,
            price,
            price_is_fallback: false,
        })
        .collect()
}

fn engine() -> ThermalSimulationEngine {
    ThermalSimulationEngine::new(TuningParameters::default())
}

#[test]
fn test_cold_flat_price_day_keeps_both_zones_warm() {
    let conditions = horizon(&[1.0; 25], -5.0);
    let schedule = ScheduleOptimizer::default().optimize(
        &engine(),
        ZoneTemps::new(21.0, 20.0),
        &conditions,
        vec![],
    );

    assert!(schedule.report.run_hours >= 1);
    assert_eq!(schedule.report.residual_violation, None);
    assert_eq!(schedule.simulation.len(), 25);
    for (hour, simulated) in schedule.simulation.hours.iter().enumerate() {
        assert!(simulated.zone_a >= 20.5, "zone A {} at hour {hour}", simulated.zone_a);
        assert!(simulated.zone_b >= 20.0, "zone B {} at hour {hour}", simulated.zone_b);
    }
}

#[test]
fn test_price_spike_hours_run_less_than_cheap_window() {
    let mut prices = [1.0; 25];
    for price in &mut prices[10..=14] {
        *price = 3.0;
    }
    let conditions = horizon(&prices, 5.0);
    let schedule = ScheduleOptimizer::default().optimize(
        &engine(),
        ZoneTemps::new(21.0, 20.0),
        &conditions,
        vec![],
    );

    let runs_in = |range: std::ops::RangeInclusive<usize>| {
        range
            .filter(|&h| schedule.hours[h].action.is_run())
            .count()
    };
    assert!(
        runs_in(10..=14) < runs_in(0..=4),
        "spike {} vs cheap {}",
        runs_in(10..=14),
        runs_in(0..=4)
    );
}

#[test]
fn test_reported_cost_matches_final_simulation() {
    let prices: Vec<f64> = (0..25).map(|h| 0.5 + (h % 7) as f64 * 0.3).collect();
    let conditions = horizon(&prices, -2.0);
    let schedule = ScheduleOptimizer::default().optimize(
        &engine(),
        ZoneTemps::new(21.0, 20.5),
        &conditions,
        vec![],
    );
    let final_cost = schedule.simulation.cost(prices.iter().copied());
    assert!((final_cost - schedule.report.cost_after_pruning).abs() < 1e-9);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_pruning_never_costs_more_or_breaks_comfort(
        prices in prop::collection::vec(0.2f64..3.0, 25),
        outdoor in -10.0f64..8.0,
    ) {
        let conditions = horizon(&prices, outdoor);
        let optimizer = ScheduleOptimizer::default();
        let schedule = optimizer.optimize(
            &engine(),
            ZoneTemps::new(21.0, 20.0),
            &conditions,
            vec![],
        );

        let steps: Vec<HourStep> = schedule
            .hours
            .iter()
            .map(|p| HourStep::new(p.action, p.offset))
            .collect();
        let replayed = engine().simulate(ZoneTemps::new(21.0, 20.0), &steps, &conditions);
        let replayed_cost: f64 = replayed
            .hours
            .iter()
            .zip(&prices)
            .map(|(s, price)| price * (s.gain_a + s.gain_b))
            .sum();
        prop_assert!((replayed_cost - schedule.report.cost_after_pruning).abs() < 1e-9);
        prop_assert!(replayed_cost <= schedule.report.cost_before_pruning + 1e-9);

        if schedule.report.residual_violation.is_none() {
            let comfort = ComfortLimits::default();
            let average = prices.iter().sum::<f64>() / prices.len() as f64;
            for (hour, simulated) in replayed.hours.iter().enumerate() {
                let relax = comfort.relaxation(prices[hour], average);
                prop_assert!(simulated.zone_a >= comfort.min_zone_a - relax - 1e-9);
                prop_assert!(simulated.zone_b >= comfort.min_zone_b - relax - 1e-9);
            }
        }
    }
}
