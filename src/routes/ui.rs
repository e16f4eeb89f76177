use axum::{response::Html, routing::get, Router};

pub fn router() -> Router {
    Router::new().route("/", get(index))
}

async fn index() -> Html<&'static str> {
    Html(r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Chat-MVP - GPT-4.1 PWA</title>
  <style>
    body { font-family: Arial, sans-serif; margin: 2rem; color: #1d1d1f; max-width: 1100px; }
    h1 { margin-bottom: 0.25rem; }
    .card { border: 1px solid #ddd; padding: 1rem; border-radius: 8px; margin-bottom: 1rem; }
    .notice { background: #fff4e5; border-color: #f0b45a; }
    .row { display: flex; gap: 0.5rem; align-items: center; flex-wrap: wrap; }
    label { display: block; margin-top: 0.75rem; font-weight: 600; }
    input[type=text], textarea { width: 100%; padding: 0.5rem; box-sizing: border-box; }
    button { padding: 0.5rem 0.9rem; }
    table { border-collapse: collapse; width: 100%; font-size: 0.9rem; }
    th, td { border: 1px solid #ddd; padding: 0.3rem 0.5rem; text-align: left; }
    .group { border-left: 4px solid #4a7bd0; }
    .group.collapsed .body { display: none; }
    pre { background: #f6f8fa; padding: 1rem; overflow: auto; white-space: pre-wrap; }
    .editor { display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; margin-top: 0.75rem; }
    #markdown { min-height: 16rem; font-family: monospace; }
    #rendered { border: 1px solid #ddd; border-radius: 4px; padding: 0 1rem; min-height: 16rem; overflow: auto; }
  </style>
</head>
<body>
  <h1>Chat-MVP</h1>
  <p>Upload a table, pre-fill one chat panel per row, query the model and export the combined document.</p>
  <div id="notice" class="card notice" hidden></div>

  <div class="card">
    <h2>1) Data</h2>
    <div class="row">
      <input id="fileInput" type="file" multiple accept=".csv,.tsv,.xlsx,.txt" />
      <button id="uploadBtn">Upload</button>
      <button id="sampleBtn">Load sample</button>
      <label class="row"><input id="headersToggle" type="checkbox" /> First row is a header</label>
    </div>
    <div id="uploadStatus"></div>
    <div id="preview"></div>
  </div>

  <div class="card">
    <h2>2) System prompt</h2>
    <textarea id="systemPrompt" rows="3"></textarea>
    <div class="row"><button id="savePromptBtn">Save prompt</button><span id="promptStatus"></span></div>
  </div>

  <div class="card">
    <h2>3) Panels</h2>
    <div class="row">
      <button id="addBtn">Add panel</button>
      <button id="removeBtn">Remove last</button>
      <button id="submitAllBtn">Submit all</button>
      <span id="groupStatus"></span>
    </div>
    <div id="groups"></div>
  </div>

  <div class="card">
    <h2>4) Output</h2>
    <div class="row">
      <button id="outputBtn">Generate output</button>
      <button id="saveDocBtn">Save edits</button>
      <a id="exportHtml">HTML</a> <a id="exportPdf">PDF</a> <a id="exportDocx">DOCX</a> <a id="exportCsv">CSV</a>
    </div>
    <div class="editor">
      <textarea id="markdown"></textarea>
      <div id="rendered"></div>
    </div>
  </div>

  <script>
    const $ = (id) => document.getElementById(id);
    let sessionId = null;

    async function api(method, path, body) {
      const opts = { method };
      if (body instanceof FormData) {
        opts.body = body;
      } else if (body !== undefined) {
        opts.headers = { 'Content-Type': 'application/json' };
        opts.body = JSON.stringify(body);
      }
      const res = await fetch(path, opts);
      const json = await res.json().catch(() => ({}));
      if (!res.ok) throw new Error(json.details || res.statusText);
      return json;
    }

    const sessionPath = (suffix) => `/api/sessions/${sessionId}${suffix}`;

    function showNotice(text) {
      $('notice').hidden = !text;
      $('notice').textContent = text || '';
    }

    function renderPreview(table) {
      if (!table) { $('preview').innerHTML = ''; return; }
      // cells arrive HTML-escaped
      const head = table.headers.length
        ? '<tr>' + table.headers.map(h => `<th>${h}</th>`).join('') + '</tr>'
        : '';
      const body = table.rows.map(r => '<tr>' + r.map(c => `<td>${c}</td>`).join('') + '</tr>').join('');
      $('preview').innerHTML = `<table>${head}${body}</table>`;
    }

    function renderGroups(groups) {
      const root = $('groups');
      root.replaceChildren();
      groups.forEach((g, idx) => {
        const card = document.createElement('div');
        card.className = 'card group' + (g.collapsed ? ' collapsed' : '');

        const title = document.createElement('div');
        title.className = 'row';
        const header = document.createElement('input');
        header.type = 'text';
        header.value = g.header;
        header.addEventListener('change', () => updateGroup(g.id, { header: header.value }));
        const collapse = document.createElement('button');
        collapse.textContent = g.collapsed ? 'Expand' : 'Collapse';
        collapse.addEventListener('click', async () => {
          const res = await api('POST', sessionPath(`/groups/${g.id}/collapse`));
          card.classList.toggle('collapsed', res.collapsed);
          collapse.textContent = res.collapsed ? 'Expand' : 'Collapse';
        });
        title.append(`${idx + 1}.`, header, collapse);

        const body = document.createElement('div');
        body.className = 'body';
        const input = document.createElement('textarea');
        input.rows = 3;
        input.value = g.input;
        input.addEventListener('change', () => updateGroup(g.id, { input: input.value }));
        const submit = document.createElement('button');
        submit.textContent = 'Submit';
        const output = document.createElement('pre');
        output.textContent = g.output;
        submit.addEventListener('click', async () => {
          submit.disabled = true;
          output.textContent = 'Waiting for the model...';
          try {
            const res = await api('POST', sessionPath(`/groups/${g.id}/submit`), { input: input.value });
            output.textContent = res.output;
          } catch (e) {
            output.textContent = e.message;
          } finally {
            submit.disabled = false;
          }
        });
        body.append(input, submit, output);

        card.append(title, body);
        root.append(card);
      });
    }

    async function updateGroup(id, patch) {
      try {
        await api('PUT', sessionPath(`/groups/${id}`), patch);
      } catch (e) {
        $('groupStatus').textContent = e.message;
      }
    }

    function applyUpload(res) {
      renderPreview(res.preview);
      renderGroups(res.groups);
      $('headersToggle').checked = res.has_headers;
      $('uploadStatus').textContent = res.message || (res.files.length ? `Loaded ${res.files.join(', ')}` : '');
    }

    function updateExportLinks() {
      for (const [id, fmt] of [['exportHtml', 'html'], ['exportPdf', 'pdf'], ['exportDocx', 'docx'], ['exportCsv', 'csv']]) {
        $(id).href = sessionPath(`/export/${fmt}`);
      }
    }

    async function init() {
      const session = await api('POST', '/api/sessions');
      sessionId = session.session_id;
      showNotice(session.notice);
      $('headersToggle').checked = session.has_headers;
      renderGroups(session.groups);
      updateExportLinks();
      const prompt = await api('GET', sessionPath('/system-prompt'));
      $('systemPrompt').value = prompt.system_prompt;
    }

    $('uploadBtn').addEventListener('click', async () => {
      const files = $('fileInput').files;
      if (!files.length) { $('uploadStatus').textContent = 'Select a file first.'; return; }
      const form = new FormData();
      for (const f of files) form.append('files', f);
      $('uploadStatus').textContent = 'Uploading...';
      try { applyUpload(await api('POST', sessionPath('/upload'), form)); }
      catch (e) { $('uploadStatus').textContent = e.message; }
    });

    $('sampleBtn').addEventListener('click', async () => {
      try { applyUpload(await api('POST', sessionPath('/sample'))); }
      catch (e) { $('uploadStatus').textContent = e.message; }
    });

    $('headersToggle').addEventListener('change', async () => {
      try { applyUpload(await api('POST', sessionPath('/headers/toggle'))); }
      catch (e) { $('uploadStatus').textContent = e.message; }
    });

    $('savePromptBtn').addEventListener('click', async () => {
      try {
        const res = await api('PUT', sessionPath('/system-prompt'), { system_prompt: $('systemPrompt').value });
        $('systemPrompt').value = res.system_prompt;
        $('promptStatus').textContent = res.dry_run ? 'Saved (dry run mode)' : 'Saved';
      } catch (e) {
        $('promptStatus').textContent = e.message;
      }
    });

    $('addBtn').addEventListener('click', async () => {
      const res = await api('POST', sessionPath('/groups'));
      renderGroups(res.groups);
      $('groupStatus').textContent = res.notice || '';
    });

    $('removeBtn').addEventListener('click', async () => {
      const res = await api('DELETE', sessionPath('/groups'));
      renderGroups(res.groups);
      $('groupStatus').textContent = res.notice || '';
    });

    $('submitAllBtn').addEventListener('click', async () => {
      $('groupStatus').textContent = 'Submitting all panels...';
      try {
        const res = await api('POST', sessionPath('/submit-all'));
        renderGroups(res.groups);
        $('groupStatus').textContent = '';
      } catch (e) {
        $('groupStatus').textContent = e.message;
      }
    });

    let renderTimer = null;
    async function renderDocument() {
      // html comes back with raw tags escaped
      try {
        const res = await api('POST', '/api/output/render', { markdown: $('markdown').value });
        $('rendered').innerHTML = res.html;
      } catch (e) {
        $('rendered').textContent = e.message;
      }
    }

    $('markdown').addEventListener('input', () => {
      clearTimeout(renderTimer);
      renderTimer = setTimeout(renderDocument, 300);
    });

    $('outputBtn').addEventListener('click', async () => {
      const res = await api('POST', sessionPath('/output'));
      $('markdown').value = res.markdown;
      await renderDocument();
    });

    $('saveDocBtn').addEventListener('click', async () => {
      await api('PUT', sessionPath('/document'), { markdown: $('markdown').value });
    });

    init().catch((e) => showNotice(e.message));
  </script>
</body>
</html>"#)
}
