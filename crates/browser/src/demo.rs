use solutree_model::{ItemType, NodeHandle};

use crate::browser::{BrowserError, SolutionBrowser};

/// Files every demo project starts with.
const PROJECT_FILES: usize = 13;
/// Files generated inside each demo folder.
const FOLDER_FILES: usize = 123;

struct DemoProject {
    name: &'static str,
    folders: &'static [&'static str],
    files: &'static [&'static str],
}

const XML_PROJECTS: &[DemoProject] = &[
    DemoProject {
        name: "Open-XML-SDK",
        folders: &[
            "BinaryFormatConverter",
            "DocumentFormat.OpenXml.Tests",
            "DocumentFormat.OpenXml",
            "build",
        ],
        files: &[
            ".gitattributes",
            ".gitignore",
            "DocumentFormat.OpenXml.snk",
            "GitVersion.yml",
            "LICENSE.txt",
            "Open-XML-SDK.sln",
            "README.md",
            "appveyor.yml",
            "dir.props",
            "dir.targets",
        ],
    },
    DemoProject {
        name: "XmlNotePad",
        folders: &["images", "src"],
        files: &[".gitattributes", ".gitignore", "LICENSE", "README.md"],
    },
    DemoProject {
        name: "OpenXml",
        folders: &["Libs", "WordToHtml", "ZipHelper"],
        files: &[".gitattributes", ".gitignore", "LICENSE", "OpenXml.sln", "README.md"],
    },
    DemoProject {
        name: "Microsoft_Virtual_Academy_Xml_To_Srt",
        folders: &["MVAXml2Subs.Tests", "MVAXml2Subs"],
        files: &[".gitattributes", ".gitignore", "LICENSE", "MVAXml2Subs.sln", "README.md"],
    },
    DemoProject {
        name: "Xml2Markdown",
        folders: &["Xml2Markdown"],
        files: &[".gitattributes", ".gitignore", "LICENSE", "Xml2Markdown.sln", "README.md"],
    },
    DemoProject {
        name: "OpenXmlDocumentLibrary",
        folders: &["OpenXmlDocumentLibrary", "OpenXmlLibrary.Tests"],
        files: &[".gitattributes", ".gitignore", "changelog.md", "OpenXmlLibrary.sln", "README.md"],
    },
    DemoProject {
        name: "XslTransformer",
        folders: &["XslTransformer.Core", "XslTransformer"],
        files: &[".gitattributes", ".gitignore", "LICENSE", "XslTransformer.sln", "README.md"],
    },
];

const ROOT_PROJECTS: &[DemoProject] = &[
    DemoProject {
        name: "vscode",
        folders: &["build", "extensions", "i18n", "resources", "scripts", "src", "test"],
        files: &[],
    },
    DemoProject {
        name: "msbuild",
        folders: &["Samples", "branding", "build", "documentation", "ref", "setup", "src", "targets"],
        files: &[],
    },
];

const EMPTY_PROJECTS: &[&str] = &[
    "AvalonEdit",
    "AvalonDock",
    "Edi",
    "XmlNotePad",
    "XmlViewer",
    "MRULib",
    "MLib",
    "Visual Studio",
];

/// 以示範資料取代瀏覽器內容。 / Replaces the browser content with the demo solution.
pub fn populate_demo(browser: &mut SolutionBrowser) -> Result<(), BrowserError> {
    let root = browser.add_solution_root_item("GitHub Projects")?;
    browser.set_expanded(root, true);
    let xml = browser.add_root_child("XML", ItemType::Folder)?;
    browser.set_expanded(xml, true);

    for project in XML_PROJECTS {
        add_project(browser, xml, project)?;
    }
    for project in ROOT_PROJECTS {
        add_project(browser, root, project)?;
    }
    for name in EMPTY_PROJECTS {
        let empty = DemoProject {
            name: *name,
            folders: &[],
            files: &[],
        };
        add_project(browser, root, &empty)?;
    }

    if let Some(sdk) = browser.tree().find_child(xml, "Open-XML-SDK") {
        browser.set_expanded(sdk, true);
        if let Some(tests) = browser.tree().find_child(sdk, "DocumentFormat.OpenXml.Tests") {
            browser.set_expanded(tests, true);
            if let Some(last) = browser.tree().find_child(tests, "file_99") {
                browser.select(last);
            }
        }
    }
    Ok(())
}

fn add_project(browser: &mut SolutionBrowser, parent: NodeHandle, project: &DemoProject) -> Result<(), BrowserError> {
    let handle = browser.add_child(project.name, ItemType::Project, parent)?;
    for index in 0..PROJECT_FILES {
        browser.add_child(format!("file_{index}"), ItemType::File, handle)?;
    }
    for folder in project.folders {
        let folder = browser.add_child(*folder, ItemType::Folder, handle)?;
        for index in 0..FOLDER_FILES {
            browser.add_child(format!("file_{index}"), ItemType::File, folder)?;
        }
    }
    for file in project.files {
        browser.add_child(*file, ItemType::File, handle)?;
    }
    browser.sort_children(parent)?;
    browser.sort_children(handle)?;
    Ok(())
}
