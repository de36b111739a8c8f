use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{ToolError, ToolResult};
use crate::models::Tool;
use crate::registry::ToolExecutor;

/// Order a set of stops to minimize total travel time.
///
/// Runs entirely in-process on a duration matrix, typically one produced
/// by distance_matrix. Nearest-neighbour construction followed by 2-opt
/// improvement; exact for the small itineraries a trip plan produces.
pub struct OptimizeRoute {
    definition: Tool,
}

#[derive(Deserialize)]
struct Args {
    durations: Vec<Vec<f64>>,
    #[serde(default)]
    round_trip: bool,
    #[serde(default)]
    start: usize,
}

impl OptimizeRoute {
    pub fn new() -> Self {
        let definition = Tool::new(
            "optimize_route",
            "Given a square matrix of travel durations in seconds between \
             stops, return the visiting order that minimizes total travel \
             time. Use distance_matrix to obtain the durations first.",
            json!({
                "type": "object",
                "required": ["durations"],
                "properties": {
                    "durations": {
                        "type": "array",
                        "items": {"type": "array", "items": {"type": "number"}},
                        "description": "Square matrix where durations[i][j] is the travel time in seconds from stop i to stop j."
                    },
                    "round_trip": {
                        "type": "boolean",
                        "description": "Whether to return to the starting stop at the end. Defaults to false."
                    },
                    "start": {
                        "type": "integer",
                        "description": "Index of the stop to begin from. Defaults to 0."
                    }
                }
            }),
        );
        Self { definition }
    }
}

impl Default for OptimizeRoute {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for OptimizeRoute {
    fn definition(&self) -> &Tool {
        &self.definition
    }

    async fn execute(&self, arguments: Value) -> ToolResult<String> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let n = args.durations.len();
        if n < 2 {
            return Err(ToolError::InvalidArguments(
                "durations must cover at least two stops".into(),
            ));
        }
        if args.durations.iter().any(|row| row.len() != n) {
            return Err(ToolError::InvalidArguments(
                "durations must be a square matrix".into(),
            ));
        }
        if args
            .durations
            .iter()
            .flatten()
            .any(|d| !d.is_finite() || *d < 0.0)
        {
            return Err(ToolError::InvalidArguments(
                "durations must be non-negative finite numbers".into(),
            ));
        }
        if args.start >= n {
            return Err(ToolError::InvalidArguments(format!(
                "start index {} is out of range for {} stops",
                args.start, n
            )));
        }

        let order = optimize(&args.durations, args.start, args.round_trip);
        let total = tour_cost(&args.durations, &order, args.round_trip);

        let mut path: Vec<String> = order.iter().map(|i| format!("stop {i}")).collect();
        if args.round_trip {
            path.push(format!("stop {}", args.start));
        }
        Ok(format!(
            "Optimized order: {}\nEstimated total travel time: {} seconds",
            path.join(" -> "),
            total.round() as i64
        ))
    }
}

/// Nearest-neighbour tour from `start`, improved with 2-opt until no
/// swap shortens it.
fn optimize(durations: &[Vec<f64>], start: usize, round_trip: bool) -> Vec<usize> {
    let n = durations.len();
    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    order.push(start);
    visited[start] = true;

    while order.len() < n {
        let here = *order.last().unwrap();
        let next = (0..n)
            .filter(|&j| !visited[j])
            .min_by(|&a, &b| durations[here][a].total_cmp(&durations[here][b]))
            .unwrap();
        order.push(next);
        visited[next] = true;
    }

    // 2-opt: reverse segments while doing so lowers the tour cost. The
    // first stop stays pinned.
    let mut best = tour_cost(durations, &order, round_trip);
    let mut improved = true;
    while improved {
        improved = false;
        for i in 1..n - 1 {
            for j in i + 1..n {
                let mut candidate = order.clone();
                candidate[i..=j].reverse();
                let cost = tour_cost(durations, &candidate, round_trip);
                if cost + 1e-9 < best {
                    best = cost;
                    order = candidate;
                    improved = true;
                }
            }
        }
    }
    order
}

fn tour_cost(durations: &[Vec<f64>], order: &[usize], round_trip: bool) -> f64 {
    let mut total: f64 = order.windows(2).map(|leg| durations[leg[0]][leg[1]]).sum();
    if round_trip {
        if let (Some(&last), Some(&first)) = (order.last(), order.first()) {
            total += durations[last][first];
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(tool: &OptimizeRoute, arguments: Value) -> ToolResult<String> {
        tool.execute(arguments).await
    }

    #[tokio::test]
    async fn test_optimize_route_orders_line_of_stops() {
        // Stops on a line: 0 at km 0, 1 at km 30, 2 at km 10, 3 at km 20.
        // The optimal open path from 0 visits them in spatial order.
        let durations = [
            [0.0, 30.0, 10.0, 20.0],
            [30.0, 0.0, 20.0, 10.0],
            [10.0, 20.0, 0.0, 10.0],
            [20.0, 10.0, 10.0, 0.0],
        ];
        let tool = OptimizeRoute::new();
        let output = run(&tool, json!({"durations": durations})).await.unwrap();
        assert!(output.contains("stop 0 -> stop 2 -> stop 3 -> stop 1"));
        assert!(output.contains("30 seconds"));
    }

    #[tokio::test]
    async fn test_optimize_route_two_opt_beats_greedy() {
        // Greedy from 0 walks 0 -> 1 -> 2 and then pays 100 to reach 3;
        // reversing the middle segment yields the optimal 0 -> 2 -> 1 -> 3.
        let durations = [
            [0.0, 2.0, 3.0, 100.0],
            [2.0, 0.0, 1.0, 2.0],
            [3.0, 1.0, 0.0, 100.0],
            [100.0, 2.0, 100.0, 0.0],
        ];
        let tool = OptimizeRoute::new();
        let output = run(&tool, json!({"durations": durations})).await.unwrap();
        assert!(output.contains("stop 0 -> stop 2 -> stop 1 -> stop 3"));
        assert!(output.contains("6 seconds"));
    }

    #[tokio::test]
    async fn test_optimize_route_round_trip_returns_to_start() {
        let durations = [
            [0.0, 10.0, 15.0],
            [10.0, 0.0, 20.0],
            [15.0, 20.0, 0.0],
        ];
        let tool = OptimizeRoute::new();
        let output = run(&tool, json!({"durations": durations, "round_trip": true}))
            .await
            .unwrap();
        assert!(output.starts_with("Optimized order: stop 0"));
        assert!(output.contains("-> stop 0\n"));
        assert!(output.contains("45 seconds"));
    }

    #[tokio::test]
    async fn test_optimize_route_respects_start_index() {
        let durations = [
            [0.0, 5.0, 100.0],
            [5.0, 0.0, 5.0],
            [100.0, 5.0, 0.0],
        ];
        let tool = OptimizeRoute::new();
        let output = run(&tool, json!({"durations": durations, "start": 2}))
            .await
            .unwrap();
        assert!(output.contains("stop 2 -> stop 1 -> stop 0"));
        assert!(output.contains("10 seconds"));
    }

    #[tokio::test]
    async fn test_optimize_route_rejects_ragged_matrix() {
        let tool = OptimizeRoute::new();
        let result = run(&tool, json!({"durations": [[0.0, 1.0], [1.0]]})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_optimize_route_rejects_single_stop() {
        let tool = OptimizeRoute::new();
        let result = run(&tool, json!({"durations": [[0.0]]})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_optimize_route_rejects_out_of_range_start() {
        let tool = OptimizeRoute::new();
        let result = run(
            &tool,
            json!({"durations": [[0.0, 1.0], [1.0, 0.0]], "start": 5}),
        )
        .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_optimize_route_rejects_negative_durations() {
        let tool = OptimizeRoute::new();
        let result = run(
            &tool,
            json!({"durations": [[0.0, -1.0], [1.0, 0.0]]}),
        )
        .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
