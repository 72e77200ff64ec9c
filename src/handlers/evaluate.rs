//! Golden dataset evaluation handler

use super::{CommandHandlers, Output};
use crate::corpus::GoldenDataset;
use crate::evaluation::Evaluator;
use crate::Result;

#[derive(Debug, Clone, clap::Args)]
pub struct EvaluateArgs {
    /// Results considered per query (precision@limit, recall@limit)
    #[arg(long)]
    pub limit: Option<usize>,
}

impl CommandHandlers {
    pub async fn handle_evaluate(&self, args: EvaluateArgs) -> Result<Output> {
        let limit = self.limit_or_default(args.limit);
        let dataset = GoldenDataset::load(&self.config.storage.golden_dataset_path)?;

        let search = self.session().await?.hybrid().await;
        let report = Evaluator::new(search, self.config.search.rrf_k)
            .evaluate(&dataset, limit)
            .await?;

        let mut lines = vec![format!("k={limit}\n")];
        for case in &report.cases {
            lines.push(format!("- Query: {}", case.query));
            lines.push(format!("    - Precision@{limit}: {:.4}", case.precision));
            lines.push(format!("    - Recall@{limit}: {:.4}", case.recall));
            lines.push(format!("    - F1 Score: {:.4}", case.f1));
            lines.push(format!("    - Retrieved: {}", case.retrieved.join(", ")));
            lines.push(format!("    - Relevant: {}\n", case.relevant.join(", ")));
        }
        lines.push(format!(
            "Mean precision {:.4}, recall {:.4}, F1 {:.4}",
            report.mean_precision, report.mean_recall, report.mean_f1
        ));

        let mut output = serde_json::to_value(&report)?;
        output["message"] = serde_json::Value::String(lines.join("\n"));
        Ok(output)
    }
}
