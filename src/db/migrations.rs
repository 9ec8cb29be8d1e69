use anyhow::{bail, Context, Result};
use rusqlite::{Connection, Transaction};

/// One schema step. Version `n` is `SCHEMA_STEPS[n - 1]`.
struct SchemaStep {
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    // Tank registry with its last estimate, plus raw level readings
    SchemaStep {
        name: "schema_v1.sql (assets, tank_readings)",
        sql: include_str!("schemas/schema_v1.sql"),
    },
    // Append-only audit trail written alongside every estimate
    SchemaStep {
        name: "schema_v2.sql (consumption_history)",
        sql: include_str!("schemas/schema_v2.sql"),
    },
];

const CURRENT_SCHEMA_VERSION: i32 = SCHEMA_STEPS.len() as i32;

/// Bring the tank database up to `CURRENT_SCHEMA_VERSION` inside one
/// transaction, tracked through `PRAGMA user_version`.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "tank database is at schema {version}, newer than this build supports ({CURRENT_SCHEMA_VERSION})"
        );
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    for target in (version + 1)..=CURRENT_SCHEMA_VERSION {
        apply_step(&tx, target)?;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}

fn apply_step(tx: &Transaction<'_>, target: i32) -> Result<()> {
    let Some(step) = usize::try_from(target - 1)
        .ok()
        .and_then(|index| SCHEMA_STEPS.get(index))
    else {
        bail!("unknown migration target version: {target}");
    };

    tx.execute_batch(step.sql)
        .with_context(|| format!("migration to version {target} failed: {}", step.name))
}
