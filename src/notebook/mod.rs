//! Conversation export as a markdown-cell notebook.

mod store;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::session::{Message, Role};

pub use store::NotebookStore;

pub const MIN_MESSAGES_FOR_EXPORT: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookCell {
    pub cell_type: String,
    pub source: Vec<String>,
}

impl NotebookCell {
    fn markdown(source: Vec<String>) -> Self {
        Self { cell_type: "markdown".to_string(), source }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSpec {
    pub display_name: String,
    pub language: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookMetadata {
    pub kernelspec: KernelSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookDocument {
    pub cells: Vec<NotebookCell>,
    pub metadata: NotebookMetadata,
}

impl NotebookDocument {
    /// Renders the transcript as one title cell plus one cell per message.
    /// Query numbering pairs messages by position, so the leading welcome
    /// message keeps user/assistant pairs aligned.
    pub fn from_messages(messages: &[Message], title: &str, now: DateTime<Local>) -> Self {
        let mut cells = Vec::with_capacity(messages.len() + 1);
        cells.push(NotebookCell::markdown(vec![
            format!("# {}\n\n", title),
            format!(
                "*Notebook generado automáticamente el {}*\n\n",
                now.format("%d/%m/%Y a las %H:%M")
            ),
            "---\n\n".to_string(),
        ]));

        for (i, message) in messages.iter().enumerate() {
            match message.role {
                Role::User => cells.push(NotebookCell::markdown(vec![
                    format!("## 🙋 Consulta {}\n\n", (i / 2) + 1),
                    format!("{}\n\n", message.content),
                ])),
                Role::Assistant => cells.push(NotebookCell::markdown(vec![
                    "### 🤖 Respuesta del Asistente\n\n".to_string(),
                    format!("{}\n\n", message.content),
                    "---\n\n".to_string(),
                ])),
            }
        }

        Self {
            cells,
            metadata: NotebookMetadata {
                kernelspec: KernelSpec {
                    display_name: "Legal Analysis".to_string(),
                    language: "markdown".to_string(),
                    name: "legal_analysis".to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn transcript() -> Vec<Message> {
        vec![
            Message::assistant("¡Hola!"),
            Message::user("¿Qué es la tutela?"),
            Message::assistant("La tutela es..."),
            Message::user("¿Y el habeas corpus?"),
            Message::assistant("El habeas corpus..."),
        ]
    }

    #[test]
    fn title_cell_carries_generation_date() {
        let now = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 0).unwrap();
        let doc = NotebookDocument::from_messages(&transcript(), "Acción de tutela", now);
        assert_eq!(doc.cells[0].source[0], "# Acción de tutela\n\n");
        assert!(
            doc.cells[0].source[1].contains("14/03/2025 a las 09:26"),
            "got {:?}",
            doc.cells[0].source[1]
        );
    }

    #[test]
    fn queries_are_numbered_by_exchange() {
        let now = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 0).unwrap();
        let doc = NotebookDocument::from_messages(&transcript(), "t", now);
        // Welcome at index 0 keeps user messages at odd indices.
        assert_eq!(doc.cells[2].source[0], "## 🙋 Consulta 1\n\n");
        assert_eq!(doc.cells[4].source[0], "## 🙋 Consulta 2\n\n");
        assert_eq!(doc.cells[3].source[0], "### 🤖 Respuesta del Asistente\n\n");
    }

    #[test]
    fn kernelspec_identifies_legal_analysis() {
        let now = Local.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let doc = NotebookDocument::from_messages(&[], "t", now);
        assert_eq!(doc.metadata.kernelspec.name, "legal_analysis");
        assert_eq!(doc.metadata.kernelspec.language, "markdown");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["metadata"]["kernelspec"]["display_name"], "Legal Analysis");
    }
}
