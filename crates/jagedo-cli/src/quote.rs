//! # Quote Subcommand
//!
//! Commission, discount and milestone-schedule quotes over the pricing
//! functions. Output is an aligned key/value table, or JSON with `--json`.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use jagedo_core::{Amount, CallerRole, ManagedBy, Percentage, Rate};
use jagedo_settlement::pricing::{self, DiscountPolicy, DEFAULT_SELF_MANAGED_DISCOUNT_BPS};

/// Arguments for the `jagedo quote` subcommand.
#[derive(Args, Debug)]
pub struct QuoteArgs {
    /// Emit JSON instead of a table.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: QuoteCommand,
}

#[derive(Subcommand, Debug)]
pub enum QuoteCommand {
    /// Split a bid total into platform commission and provider payout.
    Commission {
        /// Bid total, e.g. `100000.00`.
        #[arg(long, value_parser = parse_amount)]
        total: Amount,

        /// Commission rate as a decimal fraction, e.g. `0.10`.
        #[arg(long, value_parser = Rate::parse)]
        rate: Rate,
    },

    /// Show what a viewer sees for a request total.
    Discount {
        /// Request total.
        #[arg(long, value_parser = parse_amount)]
        total: Amount,

        /// Who manages the request: SELF or JAGEDO.
        #[arg(long, value_parser = parse_managed_by, default_value = "SELF")]
        managed_by: ManagedBy,

        /// Role of the viewer.
        #[arg(long, value_parser = parse_role, default_value = "CUSTOMER")]
        viewer: CallerRole,

        /// Self-managed discount in basis points.
        #[arg(long, default_value_t = DEFAULT_SELF_MANAGED_DISCOUNT_BPS)]
        discount_bps: u32,
    },

    /// Compute tranche amounts for a milestone plan.
    Milestones {
        /// Bid total.
        #[arg(long, value_parser = parse_amount)]
        total: Amount,

        /// Disbursement percentage with up to two decimals, once per milestone in order.
        #[arg(long = "percent", value_parser = parse_percentage, required = true)]
        percentages: Vec<Percentage>,

        /// Milestone name, once per milestone in order.
        #[arg(long = "name")]
        names: Vec<String>,
    },
}

/// One row of a milestone schedule.
#[derive(Debug, Serialize)]
struct ScheduleLine {
    name: String,
    percentage_disbursement: Percentage,
    amount: Amount,
}

/// Execute the quote subcommand. Returns the process exit code.
pub fn run_quote(args: &QuoteArgs) -> Result<u8> {
    let output = render(&args.command, args.json)?;
    println!("{output}");
    Ok(0)
}

/// Compute the quote and format it.
pub fn render(command: &QuoteCommand, json: bool) -> Result<String> {
    match command {
        QuoteCommand::Commission { total, rate } => {
            let split = pricing::commission(*total, *rate).context("commission quote failed")?;
            tracing::debug!(total = %total, rate = %rate, "computed commission");
            if json {
                return Ok(serde_json::to_string_pretty(&split)?);
            }
            Ok(table(&[
                ("total_amount", split.total_amount.to_string()),
                ("commission_rate", split.commission_rate.to_string()),
                ("jagedo_commission", split.jagedo_commission.to_string()),
                ("payable_to_provider", split.payable_to_provider.to_string()),
            ]))
        }
        QuoteCommand::Discount {
            total,
            managed_by,
            viewer,
            discount_bps,
        } => {
            let rate = Rate::from_bps(*discount_bps)
                .with_context(|| format!("invalid discount of {discount_bps} bps"))?;
            let quote = DiscountPolicy::new(rate)
                .quote(*total, *managed_by, *viewer)
                .context("discount quote failed")?;
            if json {
                return Ok(serde_json::to_string_pretty(&quote)?);
            }
            Ok(table(&[
                ("managed_by", managed_by.to_string()),
                ("viewer_role", viewer.to_string()),
                ("total_amount", quote.total_amount.to_string()),
                ("discount", quote.discount.to_string()),
                ("discounted_total", quote.discounted_total.to_string()),
            ]))
        }
        QuoteCommand::Milestones {
            total,
            percentages,
            names,
        } => {
            if !names.is_empty() && names.len() != percentages.len() {
                bail!(
                    "{} names given for {} milestones",
                    names.len(),
                    percentages.len()
                );
            }
            let amounts =
                pricing::milestone_schedule(*total, percentages).context("milestone schedule failed")?;
            let lines: Vec<ScheduleLine> = percentages
                .iter()
                .zip(amounts)
                .enumerate()
                .map(|(i, (pct, amount))| ScheduleLine {
                    name: names
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("Milestone {}", i + 1)),
                    percentage_disbursement: *pct,
                    amount,
                })
                .collect();
            if json {
                return Ok(serde_json::to_string_pretty(&lines)?);
            }
            let rows: Vec<(&str, String)> = lines
                .iter()
                .map(|l| (l.name.as_str(), format!("{:>7}  {}", l.percentage_disbursement.to_string(), l.amount)))
                .collect();
            Ok(table(&rows))
        }
    }
}

fn table(rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(k, v)| format!("{k:<width$}  {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Flag parsers ────────────────────────────────────────────────────────

fn parse_amount(s: &str) -> Result<Amount, String> {
    Amount::parse(s).map_err(|e| e.to_string())
}

fn parse_percentage(s: &str) -> Result<Percentage, String> {
    Percentage::parse(s.trim()).map_err(|e| e.to_string())
}

fn parse_role(s: &str) -> Result<CallerRole, String> {
    s.parse().map_err(|e: jagedo_core::EngineError| e.to_string())
}

fn parse_managed_by(s: &str) -> Result<ManagedBy, String> {
    match s.trim().to_ascii_uppercase().as_str() {
        "SELF" => Ok(ManagedBy::SelfManaged),
        "JAGEDO" => Ok(ManagedBy::Jagedo),
        other => Err(format!("unknown manager {other:?}, expected SELF or JAGEDO")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        quote: QuoteArgs,
    }

    fn parse(args: &[&str]) -> QuoteArgs {
        let mut argv = vec!["jagedo"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).unwrap().quote
    }

    fn amount(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    #[test]
    fn commission_table_shows_split() {
        let args = parse(&["commission", "--total", "100000.00", "--rate", "0.10"]);
        let out = render(&args.command, args.json).unwrap();
        assert!(out.contains("jagedo_commission    10000.00"));
        assert!(out.contains("payable_to_provider  90000.00"));
    }

    #[test]
    fn commission_json_round_trips_fields() {
        let args = parse(&["--json", "commission", "--total", "2500", "--rate", "0.0825"]);
        let out = render(&args.command, args.json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["jagedo_commission"], "206.25");
        assert_eq!(value["payable_to_provider"], "2293.75");
    }

    #[test]
    fn discount_defaults_to_self_managed_customer() {
        let args = parse(&["discount", "--total", "80000"]);
        match &args.command {
            QuoteCommand::Discount {
                managed_by,
                viewer,
                discount_bps,
                ..
            } => {
                assert_eq!(*managed_by, ManagedBy::SelfManaged);
                assert_eq!(*viewer, CallerRole::Customer);
                assert_eq!(*discount_bps, DEFAULT_SELF_MANAGED_DISCOUNT_BPS);
            }
            other => panic!("unexpected command {other:?}"),
        }
        let out = render(&args.command, false).unwrap();
        assert!(out.contains("discounted_total  64000.00"));
    }

    #[test]
    fn providers_see_no_discount() {
        let command = QuoteCommand::Discount {
            total: amount("80000"),
            managed_by: ManagedBy::SelfManaged,
            viewer: CallerRole::Contractor,
            discount_bps: 2_000,
        };
        let out = render(&command, false).unwrap();
        assert!(out.contains("discount          0.00"));
    }

    #[test]
    fn managed_by_and_role_parse_case_insensitively() {
        let args = parse(&[
            "discount",
            "--total",
            "100",
            "--managed-by",
            "jagedo",
            "--viewer",
            "admin",
        ]);
        match args.command {
            QuoteCommand::Discount {
                managed_by, viewer, ..
            } => {
                assert_eq!(managed_by, ManagedBy::Jagedo);
                assert_eq!(viewer, CallerRole::Admin);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn milestone_schedule_absorbs_residual_in_last_tranche() {
        let args = parse(&[
            "--json",
            "milestones",
            "--total",
            "100.00",
            "--percent",
            "33",
            "--percent",
            "33",
            "--percent",
            "34",
            "--name",
            "Foundation",
            "--name",
            "Walling",
            "--name",
            "Roofing",
        ]);
        let out = render(&args.command, args.json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let amounts: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["amount"].as_str().unwrap())
            .collect();
        assert_eq!(amounts, vec!["33.00", "33.00", "34.00"]);
        assert_eq!(value[2]["name"], "Roofing");
    }

    #[test]
    fn fractional_percentages_are_accepted() {
        let args = parse(&[
            "--json",
            "milestones",
            "--total",
            "1000",
            "--percent",
            "12.5",
            "--percent",
            "87.5",
        ]);
        let out = render(&args.command, args.json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["amount"], "125.00");
        assert_eq!(value[1]["amount"], "875.00");
        assert_eq!(value[0]["percentage_disbursement"], 12.5);

        let table = render(&args.command, false).unwrap();
        assert!(table.contains("12.5%  125.00"));
    }

    #[test]
    fn unnamed_milestones_are_numbered() {
        let command = QuoteCommand::Milestones {
            total: amount("1000"),
            percentages: vec![Percentage::new(50).unwrap(), Percentage::new(50).unwrap()],
            names: vec![],
        };
        let out = render(&command, false).unwrap();
        assert!(out.contains("Milestone 1"));
        assert!(out.contains("Milestone 2"));
    }

    #[test]
    fn plan_not_summing_to_hundred_fails() {
        let command = QuoteCommand::Milestones {
            total: amount("1000"),
            percentages: vec![Percentage::new(50).unwrap(), Percentage::new(40).unwrap()],
            names: vec![],
        };
        let err = render(&command, false).unwrap_err();
        assert!(format!("{err:#}").contains("milestone schedule failed"));
    }

    #[test]
    fn name_count_must_match_plan() {
        let command = QuoteCommand::Milestones {
            total: amount("1000"),
            percentages: vec![Percentage::new(100).unwrap()],
            names: vec!["A".into(), "B".into()],
        };
        assert!(render(&command, false).is_err());
    }

    #[test]
    fn bad_flags_are_rejected_by_parser() {
        let mut argv = vec!["jagedo", "milestones", "--total", "100", "--percent", "101"];
        assert!(Harness::try_parse_from(argv.clone()).is_err());
        argv[5] = "ten";
        assert!(Harness::try_parse_from(argv.clone()).is_err());
        argv[5] = "33.333";
        assert!(Harness::try_parse_from(argv).is_err());
        assert!(Harness::try_parse_from(["jagedo", "commission", "--total", "abc", "--rate", "0.1"]).is_err());
        assert!(Harness::try_parse_from(["jagedo", "discount", "--total", "1", "--managed-by", "ME"]).is_err());
    }
}
