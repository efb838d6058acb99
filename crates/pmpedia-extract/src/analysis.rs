use pmpedia_core::project_contracts::{IntegrationResult, ProjectStatus, UnifiedProject};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHighlight {
    pub project_id: String,
    pub project_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectAnalysis {
    pub projects: usize,
    pub status_distribution: BTreeMap<ProjectStatus, usize>,
    pub most_people: Option<ProjectHighlight>,
    pub most_snippets: Option<ProjectHighlight>,
}

impl ProjectAnalysis {
    pub fn log(&self) {
        info!(event = "project_analysis", projects = self.projects);
        for (status, count) in &self.status_distribution {
            info!(event = "project_status_count", status = %status, count = *count);
        }
        if let Some(highlight) = &self.most_people {
            info!(
                event = "project_most_people",
                project_id = %highlight.project_id,
                project = %highlight.project_name,
                people = highlight.count
            );
        }
        if let Some(highlight) = &self.most_snippets {
            info!(
                event = "project_most_snippets",
                project_id = %highlight.project_id,
                project = %highlight.project_name,
                snippets = highlight.count
            );
        }
    }
}

/// Ties go to the project listed first.
pub fn analyze(result: &IntegrationResult) -> ProjectAnalysis {
    let projects = &result.unified_projects;
    let mut status_distribution = BTreeMap::new();
    for project in projects {
        *status_distribution.entry(project.status).or_insert(0usize) += 1;
    }

    ProjectAnalysis {
        projects: projects.len(),
        status_distribution,
        most_people: highlight(projects, |project| project.mentioned_people.len()),
        most_snippets: highlight(projects, |project| project.information_snippets.len()),
    }
}

fn highlight(
    projects: &[UnifiedProject],
    count: impl Fn(&UnifiedProject) -> usize,
) -> Option<ProjectHighlight> {
    let mut best: Option<(&UnifiedProject, usize)> = None;
    for project in projects {
        let value = count(project);
        if best.map_or(true, |(_, current)| value > current) {
            best = Some((project, value));
        }
    }
    best.map(|(project, count)| ProjectHighlight {
        project_id: project.project_id.clone(),
        project_name: project.project_name.clone(),
        count,
    })
}
