//! C7: the per-cycle network snapshot. Reads the store's current state
//! (paged) and produces one aggregate row with its three child collections.

use chrono::Utc;
use ingestor_sql::Id;
use std::collections::HashMap;
use tracing::warn;

const PAGE_SIZE: i64 = 500;
const MAX_PAGES: usize = 100_000;
const SEED_VISIBILITY_WINDOW_SECS: i64 = 600;
const FRESH_SECS: i64 = 30;
const STALE_SECS: i64 = 120;

/// Reads all peers and their latest gossip/stats rows, computes the
/// aggregate, and writes it transactionally. A failure here is logged and
/// swallowed by the caller — the ingestion run row is finalized regardless
/// of whether its snapshot exists.
pub async fn compute_and_store(run_id: Id, seeds: &[url::Url], db: &sqlx::PgPool) -> sqlx::Result<Id> {
    let peers = page_all_peers(db).await?;
    let peer_ids: Vec<Id> = peers.iter().map(|p| p.id).collect();

    let latest_gossip = ingestor_sql::gossip::latest_for_peers(&peer_ids, db).await?;
    let gossip_by_peer: HashMap<Id, &ingestor_sql::gossip::LatestForPeer> =
        latest_gossip.iter().map(|g| (g.pnode_id, g)).collect();

    let latest_uptime = ingestor_sql::stats::latest_uptime_for_peers(&peer_ids, db).await?;

    let total_nodes = peers.len() as i32;
    let reachable_nodes = peers.iter().filter(|p| p.is_public).count() as i32;
    let unreachable_nodes = total_nodes - reachable_nodes;
    let reachable_percent = if total_nodes > 0 {
        reachable_nodes as f64 / total_nodes as f64 * 100.0
    } else {
        0.0
    };

    let uptimes: Vec<i64> = latest_uptime
        .iter()
        .filter_map(|u| u.uptime_seconds)
        .filter(|&u| u > 0)
        .collect();
    let median_uptime_seconds = percentile_i64(&uptimes, 50.0);
    let p90_uptime_seconds = percentile_i64(&uptimes, 90.0);

    let total_storage_committed: i64 = latest_gossip.iter().filter_map(|g| g.storage_committed).sum();
    let total_storage_used: i64 = latest_gossip.iter().filter_map(|g| g.storage_used).sum();

    let nodes_backed_off = peers.iter().filter(|p| p.failure_count > 0).count() as i32;
    let nodes_failing_stats = peers
        .iter()
        .filter(|p| p.failure_count > 0 && !p.is_public)
        .count() as i32;

    let mut version_counts: HashMap<String, i32> = HashMap::new();
    for peer in &peers {
        let version = gossip_by_peer
            .get(&peer.id)
            .and_then(|g| g.version.clone())
            .unwrap_or_else(|| "unknown".to_string());
        *version_counts.entry(version).or_default() += 1;
    }
    let version_stats: Vec<ingestor_sql::snapshots::VersionStat> = version_counts
        .into_iter()
        .map(|(version, count)| ingestor_sql::snapshots::VersionStat { version, count })
        .collect();

    let now = Utc::now();
    let since = now - chrono::Duration::seconds(SEED_VISIBILITY_WINDOW_SECS);
    let mut seed_visibility_rows = Vec::with_capacity(seeds.len());
    let mut seed_base_urls = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let seed_base_url = seed.as_str().trim_end_matches('/').to_string();
        let sightings =
            ingestor_sql::gossip::seed_sightings_since(&seed_base_url, since, db).await?;

        let (mut fresh, mut stale, mut offline) = (0, 0, 0);
        for sighting in &sightings {
            match sighting.last_seen_timestamp {
                Some(last_seen) => {
                    let age = now.timestamp() - last_seen;
                    if age < FRESH_SECS {
                        fresh += 1;
                    } else if age < STALE_SECS {
                        stale += 1;
                    } else {
                        offline += 1;
                    }
                }
                None => offline += 1,
            }
        }

        seed_base_urls.push(seed_base_url);
        seed_visibility_rows.push((sightings.len() as i32, fresh, stale, offline));
    }

    let credits = ingestor_sql::credits::all_latest_credits(db).await?;
    let credits_stat = ingestor_sql::snapshots::CreditsStat {
        median_credits: percentile_f64(&credits, 50.0),
        p90_credits: percentile_f64(&credits, 90.0),
    };

    let scalars = ingestor_sql::snapshots::Scalars {
        run_id,
        total_nodes,
        reachable_nodes,
        unreachable_nodes,
        reachable_percent,
        median_uptime_seconds,
        p90_uptime_seconds,
        total_storage_committed,
        total_storage_used,
        nodes_backed_off,
        nodes_failing_stats,
    };

    let seed_visibility: Vec<ingestor_sql::snapshots::SeedVisibility<'_>> = seed_base_urls
        .iter()
        .zip(seed_visibility_rows.iter())
        .map(|(seed_base_url, (nodes_seen, fresh, stale, offline))| {
            ingestor_sql::snapshots::SeedVisibility {
                seed_base_url,
                nodes_seen: *nodes_seen,
                fresh: *fresh,
                stale: *stale,
                offline: *offline,
            }
        })
        .collect();

    ingestor_sql::snapshots::insert(scalars, &version_stats, &seed_visibility, credits_stat, db).await
}

async fn page_all_peers(db: &sqlx::PgPool) -> sqlx::Result<Vec<ingestor_sql::peers::Peer>> {
    let mut peers = Vec::new();
    let mut after_id: Id = 0;
    for _ in 0..MAX_PAGES {
        let page = ingestor_sql::peers::page(after_id, PAGE_SIZE, db).await?;
        if page.is_empty() {
            break;
        }
        after_id = page.last().map(|p| p.id).unwrap_or(after_id);
        peers.extend(page);
    }
    if peers.len() as i64 >= PAGE_SIZE * MAX_PAGES as i64 {
        warn!("peer paging hit its safety bound; snapshot may undercount total nodes");
    }
    Ok(peers)
}

/// Percentile over a multiset using the ceiling-index definition:
/// `idx = ceil(p/100 * n) - 1`, clamped to `[0, n-1]`. Pure: same input
/// multiset always yields the same output, independent of arrival order —
/// the values are sorted before indexing. An empty set is 0, per §8's
/// boundary behavior for the uptime percentiles.
fn percentile_i64(values: &[i64], p: f64) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = percentile_index(sorted.len(), p);
    sorted[idx]
}

/// Same definition, but `None` on an empty set — the credits percentiles
/// are nullable columns, unlike uptime's.
fn percentile_f64(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = percentile_index(sorted.len(), p);
    Some(sorted[idx])
}

fn percentile_index(n: usize, p: f64) -> usize {
    let idx = (p / 100.0 * n as f64).ceil() as i64 - 1;
    idx.clamp(0, n as i64 - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zero() {
        assert_eq!(percentile_i64(&[], 50.0), 0);
        assert_eq!(percentile_i64(&[], 90.0), 0);
    }

    #[test]
    fn percentile_is_order_independent() {
        let a = percentile_i64(&[10, 30, 20, 40], 50.0);
        let b = percentile_i64(&[40, 10, 20, 30], 50.0);
        assert_eq!(a, b);
    }

    #[test]
    fn ceiling_index_definition() {
        // n=10, p90 -> ceil(0.9*10)-1 = 8 (0-indexed 9th of 10 sorted values)
        let values: Vec<i64> = (1..=10).collect();
        assert_eq!(percentile_i64(&values, 90.0), 9);
        assert_eq!(percentile_i64(&values, 50.0), 5);
    }

    #[test]
    fn small_sample_counts_snapshot() {
        let table: Vec<_> = [1usize, 2, 3, 4, 7]
            .iter()
            .map(|&n| {
                let values: Vec<i64> = (1..=n as i64).collect();
                serde_json::json!({
                    "n": n,
                    "median": percentile_i64(&values, 50.0),
                    "p90": percentile_i64(&values, 90.0),
                })
            })
            .collect();
        insta::assert_json_snapshot!(table, @r###"
        [
          {
            "median": 1,
            "n": 1,
            "p90": 1
          },
          {
            "median": 1,
            "n": 2,
            "p90": 2
          },
          {
            "median": 2,
            "n": 3,
            "p90": 3
          },
          {
            "median": 2,
            "n": 4,
            "p90": 4
          },
          {
            "median": 4,
            "n": 7,
            "p90": 7
          }
        ]
        "###);
    }
}
