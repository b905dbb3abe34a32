use serde::{Deserialize, Serialize};

/// Arguments for listing repositories in an organization or project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRepositoriesByProjectOrOrgArgs {
    /// `org/project` for a project, `org` for a whole organization.
    pub project_or_org_name: String,
}

impl ListRepositoriesByProjectOrOrgArgs {
    pub fn new(project_or_org_name: impl Into<String>) -> Self {
        Self {
            project_or_org_name: project_or_org_name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRepositoriesResponse {
    pub value: Vec<RepositoryValue>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryValue {
    pub id: String,
    pub name: String,
    #[serde(rename = "url")]
    pub api_url: String,
    pub ssh_url: String,
    pub web_url: String,
    pub is_disabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_listing_envelope() {
        let value = json!({
            "value": [{
                "id": "1",
                "name": "repo1",
                "url": "https://dev.azure.com/org/_apis/git/repositories/1",
                "sshUrl": "git@ssh.dev.azure.com:v3/org/project1/repo1",
                "webUrl": "https://dev.azure.com/org/project1/_git/repo1",
                "isDisabled": true,
                "size": 1024
            }],
            "count": 1
        });
        let response: ListRepositoriesResponse = serde_json::from_value(value).unwrap();

        assert_eq!(response.count, 1);
        let repo = &response.value[0];
        assert_eq!(repo.api_url, "https://dev.azure.com/org/_apis/git/repositories/1");
        assert_eq!(repo.ssh_url, "git@ssh.dev.azure.com:v3/org/project1/repo1");
        assert!(repo.is_disabled);
    }

    #[test]
    fn test_serialize_uses_provider_field_names() {
        let repo = RepositoryValue {
            id: "1".to_string(),
            name: "repo1".to_string(),
            api_url: "https://api".to_string(),
            ssh_url: "ssh://repo".to_string(),
            web_url: "https://web".to_string(),
            is_disabled: false,
        };
        let value = serde_json::to_value(&repo).unwrap();
        assert_eq!(value["url"], "https://api");
        assert_eq!(value["sshUrl"], "ssh://repo");
        assert_eq!(value["isDisabled"], false);
    }
}
